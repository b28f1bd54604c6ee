//! File-store collaborator for budget attachments and imported element sheets.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Location of a stored upload: the generated file name and its full path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub filename: String,
    pub path: String,
}

/// Accepts an uploaded stream and hands back where it landed.
pub trait DocumentStore: Send + Sync {
    fn save(
        &self,
        folder: &[&str],
        original_name: &str,
        contents: &[u8],
        uploaded_at: DateTime<Utc>,
    ) -> Result<StoredFile, StorageError>;

    fn read(&self, stored: &StoredFile) -> Result<Vec<u8>, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("upload has no usable file name")]
    InvalidName,
    #[error("stored file {0} not found")]
    Missing(String),
    #[error("file storage failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Prefixes the sanitized client file name with a microsecond timestamp.
pub(crate) fn stored_name(original_name: &str, uploaded_at: DateTime<Utc>) -> Result<String, StorageError> {
    let base = Path::new(original_name.trim())
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or(StorageError::InvalidName)?;
    Ok(format!("{}_{}", uploaded_at.format("%Y%m%d%H%M%S%6f"), base))
}

/// Writes uploads beneath a root directory, one sub-directory per folder segment.
#[derive(Debug, Clone)]
pub struct LocalDocumentStore {
    root: PathBuf,
}

impl LocalDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DocumentStore for LocalDocumentStore {
    fn save(
        &self,
        folder: &[&str],
        original_name: &str,
        contents: &[u8],
        uploaded_at: DateTime<Utc>,
    ) -> Result<StoredFile, StorageError> {
        let filename = stored_name(original_name, uploaded_at)?;
        let mut directory = self.root.clone();
        for segment in folder {
            directory.push(segment);
        }
        std::fs::create_dir_all(&directory)?;
        let path = directory.join(&filename);
        std::fs::write(&path, contents)?;

        Ok(StoredFile {
            filename,
            path: path.to_string_lossy().into_owned(),
        })
    }

    fn read(&self, stored: &StoredFile) -> Result<Vec<u8>, StorageError> {
        match std::fs::read(&stored.path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::Missing(stored.path.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Keeps uploads in memory. Used by the demo command and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryDocumentStore {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryDocumentStore {
    pub fn paths(&self) -> Vec<String> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn save(
        &self,
        folder: &[&str],
        original_name: &str,
        contents: &[u8],
        uploaded_at: DateTime<Utc>,
    ) -> Result<StoredFile, StorageError> {
        let filename = stored_name(original_name, uploaded_at)?;
        let mut segments: Vec<&str> = folder.to_vec();
        segments.push(&filename);
        let path = segments.join("/");
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.clone(), contents.to_vec());
        Ok(StoredFile { filename, path })
    }

    fn read(&self, stored: &StoredFile) -> Result<Vec<u8>, StorageError> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&stored.path)
            .cloned()
            .ok_or_else(|| StorageError::Missing(stored.path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn uploaded_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 14, 8, 30, 5).unwrap()
    }

    #[test]
    fn stored_name_strips_directories_and_prefixes_timestamp() {
        let name = stored_name("../../etc/quote.pdf", uploaded_at()).expect("name");
        assert_eq!(name, "20250214083005000000_quote.pdf");
        assert!(matches!(
            stored_name("  ", uploaded_at()),
            Err(StorageError::InvalidName)
        ));
    }

    #[test]
    fn local_store_writes_under_folder_segments() {
        let root = tempfile::tempdir().expect("tempdir");
        let store = LocalDocumentStore::new(root.path());
        let stored = store
            .save(&["budgets", "7"], "quote.pdf", b"%PDF", uploaded_at())
            .expect("save succeeds");

        let expected = root
            .path()
            .join("budgets")
            .join("7")
            .join("20250214083005000000_quote.pdf");
        assert_eq!(stored.path, expected.to_string_lossy());
        assert_eq!(store.read(&stored).expect("read back"), b"%PDF");
    }

    #[test]
    fn memory_store_reports_missing_files() {
        let store = MemoryDocumentStore::default();
        let missing = StoredFile {
            filename: "x.csv".to_string(),
            path: "element_sheets/x.csv".to_string(),
        };
        assert!(matches!(store.read(&missing), Err(StorageError::Missing(_))));
    }
}
