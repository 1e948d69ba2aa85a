//! Google Cloud Storage blob store.
//!
//! Talks to the GCS JSON API directly over `reqwest`. Downloads carry
//! the object generation in the `x-goog-generation` header; uploads use
//! `ifGenerationMatch` so a concurrent writer surfaces as HTTP 412,
//! mapped to [`RotaError::WriteConflict`]. Auth is a static token from
//! the configuration or, failing that, the GCE metadata server.

use super::{Blob, BlobStore, BlobVersion, storage_error};
use crate::error::{Result, RotaError};
use async_trait::async_trait;
use serde::Deserialize;

const DEFAULT_STORAGE_BASE: &str = "https://storage.googleapis.com";
const DEFAULT_METADATA_BASE: &str = "http://metadata.google.internal";

/// Generation header set by GCS on media downloads.
const GENERATION_HEADER: &str = "x-goog-generation";

/// Blob store backed by one object in a GCS bucket.
pub struct GcsStore {
    bucket: String,
    object: String,
    access_token: Option<String>,
    client: reqwest::Client,
    storage_base: String,
    metadata_base: String,
}

/// Relevant slice of an object resource returned by an upload.
#[derive(Debug, Deserialize)]
struct ObjectResource {
    generation: String,
}

/// Token response from the metadata server.
#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

impl GcsStore {
    pub fn new(bucket: &str, object: &str, access_token: Option<String>) -> Self {
        Self {
            bucket: bucket.to_owned(),
            object: object.to_owned(),
            access_token,
            client: reqwest::Client::new(),
            storage_base: DEFAULT_STORAGE_BASE.to_owned(),
            metadata_base: DEFAULT_METADATA_BASE.to_owned(),
        }
    }

    /// Point the store at an alternative API host (tests).
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        self.storage_base = base.trim_end_matches('/').to_owned();
        self
    }

    /// Point token acquisition at an alternative metadata host (tests).
    pub fn with_metadata_base_url(mut self, base: impl Into<String>) -> Self {
        self.metadata_base = base.into().trim_end_matches('/').to_owned();
        self
    }

    async fn token(&self) -> Result<String> {
        if let Some(token) = &self.access_token {
            return Ok(token.clone());
        }
        let url = format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/token",
            self.metadata_base
        );
        let response = self
            .client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| storage_error("metadata server unreachable", e))?;
        if !response.status().is_success() {
            return Err(RotaError::Storage(format!(
                "metadata server returned {}",
                response.status()
            )));
        }
        let token: MetadataToken = response
            .json()
            .await
            .map_err(|e| storage_error("cannot parse metadata token", e))?;
        Ok(token.access_token)
    }

    fn download_url(&self) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}?alt=media",
            self.storage_base,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(&self.object)
        )
    }

    fn upload_url(&self, if_generation_match: &str) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}&ifGenerationMatch={}",
            self.storage_base,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(&self.object),
            if_generation_match
        )
    }
}

#[async_trait]
impl BlobStore for GcsStore {
    async fn load(&self) -> Result<Option<Blob>> {
        let token = self.token().await?;
        let response = self
            .client
            .get(self.download_url())
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| storage_error("download failed", e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RotaError::Storage(format!(
                "download failed ({status}): {body}"
            )));
        }

        let generation = response
            .headers()
            .get(GENERATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| {
                RotaError::Storage(format!("download response missing {GENERATION_HEADER}"))
            })?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| storage_error("download body read failed", e))?;

        Ok(Some(Blob {
            bytes: bytes.to_vec(),
            version: BlobVersion::Tag(generation),
        }))
    }

    async fn save(&self, bytes: &[u8], expected: &BlobVersion) -> Result<BlobVersion> {
        let token = self.token().await?;
        // ifGenerationMatch=0 means "create only".
        let generation = match expected {
            BlobVersion::Missing => "0",
            BlobVersion::Tag(g) => g.as_str(),
        };
        let response = self
            .client
            .post(self.upload_url(generation))
            .bearer_auth(&token)
            .header("Content-Type", "application/json")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| storage_error("upload failed", e))?;

        if response.status() == reqwest::StatusCode::PRECONDITION_FAILED {
            return Err(RotaError::WriteConflict);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RotaError::Storage(format!(
                "upload failed ({status}): {body}"
            )));
        }

        let resource: ObjectResource = response
            .json()
            .await
            .map_err(|e| storage_error("cannot parse upload response", e))?;
        Ok(BlobVersion::Tag(resource.generation))
    }
}
