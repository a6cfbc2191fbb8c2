//! Whole-file persistence helpers for the cache directory.

use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::{Error, Result};

/// Atomically replace `path` with `contents` using write-to-temp-then-rename.
///
/// Readers of `path` observe either the old file or the new one, never a
/// partially written file.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let persistence = |source: std::io::Error| Error::Persistence {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(persistence)?;
    }

    let temp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));

    let write = || -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        drop(file);

        // On Windows, rename fails if destination exists
        #[cfg(windows)]
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        std::fs::rename(&temp_path, path)
    };

    write().map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        persistence(e)
    })
}

/// [`write_atomic`] on the blocking pool, keeping the fsync off the async
/// worker threads. Callers may hold their state lock across the await.
pub(crate) async fn persist(path: PathBuf, contents: Bytes) -> Result<()> {
    tokio::task::spawn_blocking(move || write_atomic(&path, &contents))
        .await
        .map_err(|e| Error::Other(format!("Persistence task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn test_persist_on_current_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feeds.json");

        persist(path.clone(), Bytes::from_static(b"{}")).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
    }

    #[tokio::test]
    async fn test_persist_reports_path_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"").unwrap();

        let err = persist(blocked.join("news.html"), Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Persistence { path, .. } if path.ends_with("news.html")));
    }

    #[test]
    fn test_write_atomic_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("page.html");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");

        // No temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name() != "page.html")
            .collect();
        assert!(leftovers.is_empty());
    }
}
