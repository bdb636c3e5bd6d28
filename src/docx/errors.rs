//! Document loading error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading regulation documents
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Data directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Not a valid .docx archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Archive is missing {0}")]
    MissingPart(String),

    #[error("Document has no extractable text")]
    Empty,
}

/// Result type alias for document loading
pub type Result<T> = std::result::Result<T, LoadError>;
