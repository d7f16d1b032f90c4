//! Staged input files.
//!
//! An upload is written to a freshly named file in the staging directory and
//! owned by a [`StagedFile`] guard that deletes it on drop. Files left behind
//! by a crashed process are removed by [`sweep_orphans`].

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// `<utc timestamp>-<sequence>-<hash of name and content><ext>`.
pub fn staged_file_name(original_name: &str, bytes: &[u8], at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(original_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(bytes);
    let digest = hasher.finalize();

    let ext = ocrgate_media::extension_of(original_name).unwrap_or_default();
    format!(
        "{}-{}-{}{}",
        at.format("%Y%m%dT%H%M%S%6f"),
        SEQUENCE.fetch_add(1, Ordering::Relaxed),
        hex::encode(&digest[..8]),
        ext
    )
}

/// A file in the staging area that is deleted when the guard drops.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    /// Writes `bytes` to a new file under `dir`. A partially written file is
    /// removed before the error is returned.
    pub async fn create(dir: &Path, original_name: &str, bytes: &[u8]) -> io::Result<Self> {
        fs::create_dir_all(dir).await?;
        let path = dir.join(staged_file_name(original_name, bytes, Utc::now()));

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        let staged = Self { path };
        file.write_all(bytes).await?;
        file.flush().await?;
        debug!(path = %staged.path.display(), size = bytes.len(), "Staged upload");
        Ok(staged)
    }

    /// Takes ownership of a file some collaborator already wrote.
    pub fn adopt(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn size(&self) -> io::Result<u64> {
        Ok(fs::metadata(&self.path).await?.len())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed staged file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove staged file"),
        }
    }
}

/// Deletes regular files in `dir` last modified more than `retention` ago.
/// Returns how many were removed. A missing directory counts as empty.
pub async fn sweep_orphans(dir: &Path, retention: Duration) -> io::Result<usize> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let now = SystemTime::now();
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        // Entries can vanish mid-scan when a request finishes.
        let Ok(meta) = entry.metadata().await else { continue };
        if !meta.is_file() {
            continue;
        }
        let age = meta
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age <= retention {
            continue;
        }
        match fs::remove_file(entry.path()).await {
            Ok(()) => {
                removed += 1;
                debug!(path = %entry.path().display(), age_secs = age.as_secs(), "Removed orphaned staged file");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %entry.path().display(), error = %e, "Failed to remove orphaned file"),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_keep_extension_and_differ() {
        let at = Utc::now();
        let a = staged_file_name("scan.PNG", b"abc", at);
        let b = staged_file_name("scan.PNG", b"abc", at);
        assert!(a.ends_with(".png"));
        assert_ne!(a, b);
        assert_ne!(
            staged_file_name("a.png", b"1", at).rsplit('-').next(),
            staged_file_name("a.png", b"2", at).rsplit('-').next()
        );
    }

    #[tokio::test]
    async fn guard_deletes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedFile::create(dir.path(), "x.png", b"12345").await.unwrap();
        let path = staged.path().to_path_buf();
        assert_eq!(staged.size().await.unwrap(), 5);
        assert!(path.exists());
        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn creates_missing_staging_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("upload");
        let staged = StagedFile::create(&nested, "x.jpg", b"").await.unwrap();
        assert!(staged.path().starts_with(&nested));
    }

    #[test]
    fn adopted_file_already_gone_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        drop(StagedFile::adopt(dir.path().join("never-written.png")));
    }

    #[tokio::test]
    async fn sweep_respects_retention() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.png"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        assert_eq!(sweep_orphans(dir.path(), Duration::from_secs(3600)).await.unwrap(), 0);
        assert!(dir.path().join("old.png").exists());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sweep_orphans(dir.path(), Duration::from_millis(1)).await.unwrap(), 1);
        assert!(!dir.path().join("old.png").exists());
        assert!(dir.path().join("subdir").exists());
    }

    #[tokio::test]
    async fn sweep_of_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            sweep_orphans(&dir.path().join("absent"), Duration::ZERO).await.unwrap(),
            0
        );
    }
}
