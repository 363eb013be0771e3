//! Scratch directory for rendered artifacts
//!
//! Rendered PDFs, HTML labels and raw spool files live in
//! `<os-temp>/repairmind-print/`, named by job id so concurrent jobs
//! never share a path. Files are removed after a grace period rather
//! than right after submission: the OS spooler reads the file
//! asynchronously and deleting too early truncates the print.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Minimum time a rendered file stays on disk after submission.
const CLEANUP_GRACE: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
    grace: Duration,
}

impl ScratchDir {
    /// The process-wide scratch dir under the OS temp directory.
    pub fn new() -> std::io::Result<Self> {
        let root = std::env::temp_dir().join("repairmind-print");
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            grace: CLEANUP_GRACE,
        })
    }

    /// Scratch dir at an explicit location (tests).
    pub fn at(root: PathBuf) -> Self {
        let _ = std::fs::create_dir_all(&root);
        Self {
            root,
            grace: CLEANUP_GRACE,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for a job's rendered artifact.
    pub fn file_for(&self, job_id: &str, extension: &str) -> PathBuf {
        self.root
            .join(format!("{}.{extension}", sanitize(job_id)))
    }

    /// Delete a file after the grace period, independent of the print
    /// outcome. Best-effort: a vanished file is not an error.
    pub fn schedule_cleanup(&self, path: PathBuf) {
        let grace = self.grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(path = %path.display(), "Scratch cleanup failed: {e}");
                }
            }
        });
    }
}

/// Job ids are opaque server strings; keep only filesystem-safe chars.
fn sanitize(job_id: &str) -> String {
    job_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_for_uses_job_id() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::at(dir.path().to_path_buf());
        let path = scratch.file_for("test-1736784000", "pdf");
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "test-1736784000.pdf"
        );
        assert!(path.starts_with(dir.path()));
    }

    #[test]
    fn test_sanitize_strips_separators() {
        assert_eq!(sanitize("job/../../etc"), "job_.._.._etc");
        assert_eq!(sanitize("J1"), "J1");
    }

    #[tokio::test]
    async fn test_cleanup_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut scratch = ScratchDir::at(dir.path().to_path_buf());
        scratch.grace = Duration::from_millis(10);

        let path = scratch.file_for("J1", "pdf");
        std::fs::write(&path, b"x").unwrap();
        scratch.schedule_cleanup(path.clone());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!path.exists());
    }
}
