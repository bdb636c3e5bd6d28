//! Directory scanning for regulation documents.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use super::errors::{LoadError, Result};
use super::import::load_document;
use crate::rag::Document;

/// A file that could not be loaded, and why.
#[derive(Debug)]
pub struct LoadFailure {
    pub document_id: String,
    pub error: LoadError,
}

/// Result of scanning a data directory.
#[derive(Debug, Default)]
pub struct LoadedBatch {
    /// Loaded documents, sorted by id
    pub documents: Vec<Document>,
    pub failures: Vec<LoadFailure>,
}

/// Load every `.docx` under `dir`.
///
/// Only the top level is read unless `recursive` is set. A missing directory
/// fails the whole call; a bad file is reported in [`LoadedBatch::failures`]
/// and the rest of the batch still loads.
pub fn load_directory(dir: &Path, recursive: bool) -> Result<LoadedBatch> {
    if !dir.is_dir() {
        return Err(LoadError::DirectoryNotFound(dir.to_path_buf()));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut batch = LoadedBatch::default();
    let mut files: Vec<(String, PathBuf)> = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let document_id = e
                    .path()
                    .map(|p| document_id(dir, p))
                    .unwrap_or_default();
                log::warn!("Skipping unreadable entry {}: {}", document_id, e);
                batch.failures.push(LoadFailure {
                    document_id,
                    error: e.into(),
                });
                continue;
            }
        };

        if entry.file_type().is_file() && is_docx(entry.path()) {
            files.push((document_id(dir, entry.path()), entry.into_path()));
        }
    }

    files.sort();

    for (id, path) in files {
        match load_document(&path, &id) {
            Ok(document) => {
                log::debug!("Loaded {} ({} chars)", id, document.text.chars().count());
                batch.documents.push(document);
            }
            Err(error) => {
                log::warn!("Failed to load {}: {}", id, error);
                batch.failures.push(LoadFailure {
                    document_id: id,
                    error,
                });
            }
        }
    }

    log::info!(
        "Loaded {} documents from {} ({} failed)",
        batch.documents.len(),
        dir.display(),
        batch.failures.len()
    );

    Ok(batch)
}

/// Path relative to the data directory, `/`-separated.
fn document_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_docx(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("docx"))
        .unwrap_or(false)
}

/// Dotfiles and Word lock files (`~$name.docx`).
fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.') || name.starts_with("~$"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_docx;
    use std::fs;
    use tempfile::TempDir;

    fn ids(batch: &LoadedBatch) -> Vec<&str> {
        batch.documents.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let result = load_directory(&dir.path().join("nope"), false);
        assert!(matches!(result, Err(LoadError::DirectoryNotFound(_))));
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        let batch = load_directory(dir.path(), false).unwrap();
        assert!(batch.documents.is_empty());
        assert!(batch.failures.is_empty());
    }

    #[test]
    fn test_skips_unsupported_and_hidden_files() {
        let dir = TempDir::new().unwrap();
        write_docx(&dir.path().join("b.docx"), None, &["second"], &[]);
        write_docx(&dir.path().join("A.DOCX"), None, &["first"], &[]);
        write_docx(&dir.path().join("~$b.docx"), None, &["lock"], &[]);
        write_docx(&dir.path().join(".hidden.docx"), None, &["hidden"], &[]);
        fs::write(dir.path().join("notes.txt"), "not a docx").unwrap();
        fs::write(dir.path().join("old.doc"), "legacy").unwrap();

        let batch = load_directory(dir.path(), false).unwrap();
        assert_eq!(ids(&batch), vec!["A.DOCX", "b.docx"]);
        assert!(batch.failures.is_empty());
    }

    #[test]
    fn test_recursion_is_opt_in() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("인사")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        write_docx(&dir.path().join("top.docx"), None, &["top"], &[]);
        write_docx(&dir.path().join("인사/복무규정.docx"), None, &["nested"], &[]);
        write_docx(&dir.path().join(".git/x.docx"), None, &["ignored"], &[]);

        let flat = load_directory(dir.path(), false).unwrap();
        assert_eq!(ids(&flat), vec!["top.docx"]);

        let deep = load_directory(dir.path(), true).unwrap();
        assert_eq!(ids(&deep), vec!["top.docx", "인사/복무규정.docx"]);
    }

    #[test]
    fn test_bad_file_does_not_stop_batch() {
        let dir = TempDir::new().unwrap();
        write_docx(&dir.path().join("good.docx"), None, &["ok"], &[]);
        fs::write(dir.path().join("broken.docx"), b"not a zip").unwrap();

        let batch = load_directory(dir.path(), false).unwrap();
        assert_eq!(ids(&batch), vec!["good.docx"]);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].document_id, "broken.docx");
        assert!(matches!(batch.failures[0].error, LoadError::Zip(_)));
    }
}
