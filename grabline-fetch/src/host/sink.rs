//! Byte sinks: persist already-fetched bytes under a filename.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, instrument, warn};

use crate::error::FetchError;

/// Extension of the transient file written before the final rename.
const PART_EXTENSION: &str = "part";

/// Numbers transient files so concurrent saves of one name never share one.
static NEXT_TRANSIENT: AtomicU64 = AtomicU64::new(0);

/// Saves bytes under a filename.
#[async_trait]
pub trait ByteSink: Send + Sync {
    /// Persists `bytes` as `filename`.
    async fn save_bytes(&self, bytes: Bytes, filename: &str) -> Result<(), FetchError>;
}

// ============================================================================
// Directory Sink
// ============================================================================

/// Writes files into a directory.
///
/// Each save writes its own transient `.part` file and renames it into place,
/// so a partially written file never carries the final name. The transient
/// file is removed if anything fails.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Creates a sink for `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the target directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn target(&self, filename: &str) -> Result<PathBuf, FetchError> {
        let name = Path::new(filename)
            .file_name()
            .ok_or_else(|| FetchError::Other(format!("invalid filename: {filename}")))?;
        Ok(self.dir.join(name))
    }
}

#[async_trait]
impl ByteSink for DirectorySink {
    #[instrument(skip(self, bytes), fields(dir = %self.dir.display(), size = bytes.len()))]
    async fn save_bytes(&self, bytes: Bytes, filename: &str) -> Result<(), FetchError> {
        let target = self.target(filename)?;
        let transient = target.with_file_name(format!(
            "{}.{}-{}.{PART_EXTENSION}",
            target.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
            std::process::id(),
            NEXT_TRANSIENT.fetch_add(1, Ordering::Relaxed)
        ));

        tokio::fs::create_dir_all(&self.dir).await?;

        let written = async {
            tokio::fs::write(&transient, &bytes).await?;
            tokio::fs::rename(&transient, &target).await
        }
        .await;

        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&transient).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %transient.display(), error = %cleanup, "Failed to remove transient file");
                }
            }
            return Err(e.into());
        }

        debug!(path = %target.display(), "File saved");
        Ok(())
    }
}

// ============================================================================
// Null Sink
// ============================================================================

/// Sink used when there is nowhere to put files. Saves succeed and do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl ByteSink for NullSink {
    async fn save_bytes(&self, bytes: Bytes, filename: &str) -> Result<(), FetchError> {
        debug!(filename, size = bytes.len(), "No output context, discarding bytes");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_directory_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("out"));

        sink.save_bytes(Bytes::from_static(b"abc"), "user_1_1.jpg").await.unwrap();

        let saved = tokio::fs::read(dir.path().join("out/user_1_1.jpg")).await.unwrap();
        assert_eq!(saved, b"abc");
        assert_eq!(std::fs::read_dir(dir.path().join("out")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_directory_sink_strips_path_components() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path());

        sink.save_bytes(Bytes::from_static(b"x"), "../escape.jpg").await.unwrap();
        assert!(dir.path().join("escape.jpg").exists());
    }

    #[tokio::test]
    async fn test_directory_sink_cleans_up_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A directory occupying the target name makes the rename fail.
        std::fs::create_dir(dir.path().join("taken.jpg")).unwrap();
        std::fs::write(dir.path().join("taken.jpg/keep"), b"1").unwrap();
        let sink = DirectorySink::new(dir.path());

        let result = sink.save_bytes(Bytes::from_static(b"x"), "taken.jpg").await;
        assert!(matches!(result, Err(FetchError::Io(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_saves_of_one_name() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path());
        let first = Bytes::from(vec![b'a'; 64 * 1024]);
        let second = Bytes::from(vec![b'b'; 64 * 1024]);

        let (a, b) = tokio::join!(
            sink.save_bytes(first.clone(), "same.jpg"),
            sink.save_bytes(second.clone(), "same.jpg")
        );
        a.unwrap();
        b.unwrap();

        let saved = std::fs::read(dir.path().join("same.jpg")).unwrap();
        assert!(saved[..] == first[..] || saved[..] == second[..], "file mixes both writers");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_null_sink_is_noop() {
        assert!(NullSink.save_bytes(Bytes::new(), "a.jpg").await.is_ok());
    }
}
