//! Word document loading
//!
//! Reads regulation documents from a data directory. Supports:
//! - Top-level paragraphs, with tabs and line breaks kept
//! - Table rows, one line per row
//! - The document title from the core properties
//! - Content fingerprints for skipping unchanged files

mod errors;
mod import;
mod loader;

pub use errors::{LoadError, Result};
pub use import::{clean_text, fingerprint, load_document, read_docx, DocxContent};
pub use loader::{load_directory, LoadFailure, LoadedBatch};
