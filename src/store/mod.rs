//! Blob storage backends.
//!
//! The roster document is read and written wholesale. Each backend
//! attaches an opaque [`BlobVersion`] to the bytes it returns; a save
//! is conditional on that version still being current, so concurrent
//! writers fail fast with [`RotaError::WriteConflict`] instead of
//! silently losing updates.

mod gcs;
mod local;

pub use gcs::GcsStore;
pub use local::LocalFileStore;

use crate::config::StorageConfig;
use crate::error::{Result, RotaError};
use crate::roster::Roster;
use async_trait::async_trait;
use std::sync::Arc;

/// Opaque version token for conditional writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobVersion {
    /// The blob did not exist at load time; a save creates it.
    Missing,
    /// Backend-specific tag (file-content digest, GCS generation).
    Tag(String),
}

/// A stored blob together with the version it was read at.
#[derive(Debug, Clone)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub version: BlobVersion,
}

/// Read-whole / write-whole blob store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the full blob, or `None` when it does not exist yet.
    async fn load(&self) -> Result<Option<Blob>>;

    /// Write the full blob if its current version still matches
    /// `expected`. Returns the new version on success.
    async fn save(&self, bytes: &[u8], expected: &BlobVersion) -> Result<BlobVersion>;
}

/// Build the backend selected by the configuration.
pub fn from_config(storage: &StorageConfig) -> Arc<dyn BlobStore> {
    match storage {
        StorageConfig::LocalFile { path } => Arc::new(LocalFileStore::new(path.clone())),
        StorageConfig::Gcs {
            bucket,
            object,
            access_token,
        } => Arc::new(GcsStore::new(bucket, object, access_token.clone())),
    }
}

/// Load the roster and the version token it was read at.
///
/// A missing blob is an empty roster with [`BlobVersion::Missing`].
pub async fn load_roster(store: &dyn BlobStore) -> Result<(Roster, BlobVersion)> {
    match store.load().await? {
        Some(blob) => Ok((Roster::from_json(&blob.bytes)?, blob.version)),
        None => Ok((Roster::new(), BlobVersion::Missing)),
    }
}

/// Persist the roster, conditional on `expected` still being current.
pub async fn save_roster(
    store: &dyn BlobStore,
    roster: &Roster,
    expected: &BlobVersion,
) -> Result<BlobVersion> {
    let bytes = roster.to_json()?;
    store.save(&bytes, expected).await
}

/// Shared helper for backends mapping unexpected errors.
pub(crate) fn storage_error(context: &str, detail: impl std::fmt::Display) -> RotaError {
    RotaError::Storage(format!("{context}: {detail}"))
}
