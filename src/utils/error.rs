// src/utils/error.rs
use thiserror::Error;

// Errors that stop a document from being loaded at all
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Archive could not be read: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error while reading archive entry: {0}")]
    Io(#[from] std::io::Error),

    #[error("No statement document found in archive ({0} entries scanned)")]
    NoStatementDocument(usize),
}

/// Per-fact normalization failures. These never abort an extraction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("Fact text is empty")]
    Empty,

    #[error("Could not parse '{0}' as a number")]
    Unparsable(String),

    #[error("Value of '{0}' is out of range after scaling")]
    OutOfRange(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Snapshot already stored: {0}")]
    DuplicateSnapshot(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Document could not be loaded: {0}")]
    Load(#[from] LoadError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
