// src/lib.rs
//! Normalizes XBRL and Inline XBRL financial disclosures into a small set of
//! canonical line items, grouped by statement.

pub mod document;
pub mod extractors;
pub mod storage;
pub mod utils;

pub use extractors::{
    extract, extract_auto, extract_fallback, extract_with, CanonicalKey, ExtractOptions, Extraction,
    ExtractionResult, FallbackResult, FieldStatus, Section,
};
pub use utils::error::{AppError, LoadError, StorageError, ValueError};
