//! Atomic queue snapshot persistence
//!
//! The queue file is a single JSON document replaced atomically:
//! serialize to `<path>.tmp`, fsync, rename over `<path>`. A reader
//! never observes a torn file, but it may observe a stale main file
//! after a crash between write and rename, so loading falls back to
//! `.tmp` when the main file is absent or unparseable.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::entry::{QueueEntry, QueueMetrics};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// On-disk queue snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueFile {
    pub jobs: Vec<QueueEntry>,
    #[serde(default)]
    pub metrics: QueueMetrics,
    pub saved_at: i64,
}

/// Queue snapshot store with tmp-rename atomicity.
#[derive(Debug, Clone)]
pub struct QueueStore {
    path: PathBuf,
}

impl QueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut os = self.path.clone().into_os_string();
        os.push(".tmp");
        PathBuf::from(os)
    }

    /// Load the last snapshot, falling back to `.tmp`.
    ///
    /// Returns None when neither file yields a parseable snapshot.
    pub fn load(&self) -> Option<QueueFile> {
        match Self::read_file(&self.path) {
            Some(file) => Some(file),
            None => {
                let tmp = self.tmp_path();
                let file = Self::read_file(&tmp);
                if file.is_some() {
                    tracing::warn!(
                        path = %self.path.display(),
                        "Queue file missing or corrupt, recovered from .tmp"
                    );
                }
                file
            }
        }
    }

    fn read_file(path: &Path) -> Option<QueueFile> {
        let bytes = fs::read(path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to parse queue file: {e}");
                None
            }
        }
    }

    /// Write a snapshot atomically: tmp, fsync, rename.
    pub fn save(&self, file: &QueueFile) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let bytes = serde_json::to_vec(file)?;
        let tmp = self.tmp_path();

        let mut f = fs::File::create(&tmp)?;
        f.write_all(&bytes)?;
        f.sync_all()?;
        drop(f);

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::entry::JobStatus;
    use shared::{JobPriority, PrintJob};

    fn job(id: &str) -> PrintJob {
        serde_json::from_str(&format!(
            r#"{{"id":"{id}","printerSystemName":"P1","documentType":"receipt"}}"#
        ))
        .unwrap()
    }

    fn snapshot() -> QueueFile {
        let mut entry = QueueEntry::new(job("J1"), JobPriority::Normal, 1000, 3);
        entry.status = JobStatus::Queued;
        QueueFile {
            jobs: vec![entry],
            metrics: QueueMetrics {
                total_enqueued: 1,
                ..Default::default()
            },
            saved_at: shared::util::now_millis(),
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = QueueStore::new(dir.path().join("job-queue.json"));

        let file = snapshot();
        store.save(&file).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.jobs.len(), 1);
        assert_eq!(loaded.jobs[0].job.id, "J1");
        assert_eq!(loaded.metrics.total_enqueued, 1);
        // No .tmp left behind after a clean save.
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn test_load_falls_back_to_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let store = QueueStore::new(dir.path().join("job-queue.json"));

        // Simulate a crash after writing .tmp but before the rename.
        let bytes = serde_json::to_vec(&snapshot()).unwrap();
        fs::write(store.tmp_path(), &bytes).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.jobs[0].job.id, "J1");
    }

    #[test]
    fn test_corrupt_main_falls_back_to_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let store = QueueStore::new(dir.path().join("job-queue.json"));

        fs::write(store.path(), b"{ not json").unwrap();
        let bytes = serde_json::to_vec(&snapshot()).unwrap();
        fs::write(store.tmp_path(), &bytes).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.jobs.len(), 1);
    }

    #[test]
    fn test_load_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = QueueStore::new(dir.path().join("job-queue.json"));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_save_overwrites_previous() {
        let dir = tempfile::tempdir().unwrap();
        let store = QueueStore::new(dir.path().join("job-queue.json"));

        store.save(&snapshot()).unwrap();
        let mut second = snapshot();
        second.jobs.clear();
        store.save(&second).unwrap();

        assert!(store.load().unwrap().jobs.is_empty());
    }
}
