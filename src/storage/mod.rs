// src/storage/mod.rs
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::utils::error::StorageError;

/// Identity of one stored extraction. At most one snapshot exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub company: String,
    pub period: String,
    pub source: String,
}

impl SnapshotKey {
    pub fn new(company: &str, period: &str, source: &str) -> Self {
        Self {
            company: company.to_string(),
            period: period.to_string(),
            source: source.to_string(),
        }
    }
}

impl std::fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.company, self.period, self.source)
    }
}

pub struct SnapshotStore {
    base_dir: PathBuf,
}

impl SnapshotStore {
    /// Creates a new SnapshotStore with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    /// Location of a snapshot: /base_dir/COMPANY/period/source.json
    pub fn path_for(&self, key: &SnapshotKey) -> PathBuf {
        self.base_dir
            .join(path_component(&key.company.to_uppercase()))
            .join(path_component(&key.period))
            .join(format!("{}.json", path_component(&key.source)))
    }

    pub fn contains(&self, key: &SnapshotKey) -> bool {
        self.path_for(key).exists()
    }

    /// Writes the snapshot with its key and a timestamp.
    /// A key that is already stored is rejected, never overwritten.
    pub fn save<T: Serialize>(
        &self,
        key: &SnapshotKey,
        result: &T,
    ) -> Result<PathBuf, StorageError> {
        let file_path = self.path_for(key);
        if let Some(dir) = file_path.parent() {
            fs::create_dir_all(dir).map_err(StorageError::IoError)?;
        }

        let snapshot = serde_json::json!({
            "company": key.company,
            "period": key.period,
            "source": key.source,
            "extraction_timestamp": chrono::Utc::now().to_rfc3339(),
            "result": result,
        });
        let snapshot_str = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&file_path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::warn!("Snapshot for {} already exists at {}", key, file_path.display());
                return Err(StorageError::DuplicateSnapshot(key.to_string()));
            }
            Err(e) => return Err(StorageError::IoError(e)),
        };
        file.write_all(snapshot_str.as_bytes())
            .map_err(StorageError::IoError)?;

        tracing::info!("Saved snapshot to {}", file_path.display());

        Ok(file_path)
    }
}

// Keeps each key part a single, non-traversing path segment
fn path_component(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '\0') { '_' } else { c })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_writes_snapshot() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("snapshots")).unwrap();
        let key = SnapshotKey::new("e01234", "FY2024", "edinet");

        let path = store.save(&key, &serde_json::json!({"PL": {"売上高": 1.0}})).unwrap();
        assert_eq!(path, dir.path().join("snapshots/E01234/FY2024/edinet.json"));
        assert!(store.contains(&key));

        let stored: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored["company"], "e01234");
        assert_eq!(stored["result"]["PL"]["売上高"], 1.0);
        assert!(stored["extraction_timestamp"].is_string());
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path()).unwrap();
        let key = SnapshotKey::new("E1", "FY2023", "edinet");

        store.save(&key, &1).unwrap();
        match store.save(&key, &2) {
            Err(StorageError::DuplicateSnapshot(k)) => assert_eq!(k, "E1/FY2023/edinet"),
            other => panic!("expected duplicate rejection, got {:?}", other),
        }

        // A different source for the same company and period is a separate snapshot
        assert!(store.save(&SnapshotKey::new("E1", "FY2023", "jquants"), &3).is_ok());
    }

    #[test]
    fn test_key_parts_cannot_escape_base_dir() {
        let store = SnapshotStore { base_dir: PathBuf::from("/base") };
        let path = store.path_for(&SnapshotKey::new("../x", "..", "a/b"));
        assert_eq!(path, PathBuf::from("/base/.._X/_/a_b.json"));
    }
}
