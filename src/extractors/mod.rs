// src/extractors/mod.rs
pub mod canonical;
pub mod context;
pub mod engine;
pub mod facts;
pub mod fallback;
pub mod select;
pub mod value;

// Re-export key extraction types for convenience
pub use canonical::{CanonicalKey, Section};
pub use engine::{extract, extract_auto, extract_document, extract_with, ExtractOptions, Extraction};
pub use fallback::{extract_fallback, FallbackResult};
pub use select::{Diagnostics, ExtractionResult, FieldStatus};
