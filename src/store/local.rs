//! Local single-file blob store.
//!
//! Used when no GCS bucket is configured. The version token is the
//! SHA-256 digest of the file contents, re-read immediately before a
//! conditional write. There is no OS-level lock between the check and
//! the write, so the conflict check is best-effort; it still catches
//! the common case of two requests racing on the same file.

use super::{Blob, BlobStore, BlobVersion, storage_error};
use crate::error::{Result, RotaError};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Blob store backed by one file on the local filesystem.
pub struct LocalFileStore {
    path: PathBuf,
}

impl LocalFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Current on-disk version: content digest, or `Missing`.
    async fn current_version(&self) -> Result<BlobVersion> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(BlobVersion::Tag(digest_hex(&bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BlobVersion::Missing),
            Err(e) => Err(storage_error("cannot read data file", e)),
        }
    }
}

fn digest_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl BlobStore for LocalFileStore {
    async fn load(&self) -> Result<Option<Blob>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let version = BlobVersion::Tag(digest_hex(&bytes));
                Ok(Some(Blob { bytes, version }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error("cannot read data file", e)),
        }
    }

    async fn save(&self, bytes: &[u8], expected: &BlobVersion) -> Result<BlobVersion> {
        if self.current_version().await? != *expected {
            return Err(RotaError::WriteConflict);
        }
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error("cannot create data dir", e))?;
        }
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| storage_error("cannot write data file", e))?;
        Ok(BlobVersion::Tag(digest_hex(bytes)))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> LocalFileStore {
        LocalFileStore::new(dir.path().join("data.json"))
    }

    #[tokio::test]
    async fn load_missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let version = store.save(b"hello", &BlobVersion::Missing).await.unwrap();
        assert!(matches!(version, BlobVersion::Tag(_)));

        let blob = store.load().await.unwrap().expect("blob should exist");
        assert_eq!(blob.bytes, b"hello");
        assert_eq!(blob.version, version);
    }

    #[tokio::test]
    async fn save_with_stale_version_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let v1 = store.save(b"one", &BlobVersion::Missing).await.unwrap();
        store.save(b"two", &v1).await.unwrap();

        // v1 is now stale.
        let err = store.save(b"three", &v1).await.unwrap_err();
        assert!(matches!(err, RotaError::WriteConflict));

        let blob = store.load().await.unwrap().unwrap();
        assert_eq!(blob.bytes, b"two");
    }

    #[tokio::test]
    async fn create_only_save_conflicts_when_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.save(b"one", &BlobVersion::Missing).await.unwrap();
        let err = store.save(b"two", &BlobVersion::Missing).await.unwrap_err();
        assert!(matches!(err, RotaError::WriteConflict));
    }
}
