//! Where generated design images are kept.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use super::error::DesignError;
use crate::config::BlobStorageConfig;
use crate::services::uploads::UploadStore;

/// Subdirectory (or blob prefix) for design images.
pub const DESIGN_DIR: &str = "designs";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct BlobPutResponse {
    url: String,
}

/// HTTP blob store: `PUT {base_url}/{path}` with a bearer token, answering `{"url": ...}`.
#[derive(Clone)]
pub struct BlobClient {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
}

impl std::fmt::Debug for BlobClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl BlobClient {
    /// # Errors
    ///
    /// Returns `DesignError::Http` if the HTTP client cannot be built.
    pub fn new(config: &BlobStorageConfig) -> Result<Self, DesignError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            token: config.token.clone(),
        })
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String, DesignError> {
        let response = self
            .client
            .put(format!("{}/{path}", self.base_url))
            .bearer_auth(self.token.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DesignError::Storage {
                status: status.as_u16(),
                message,
            });
        }

        let body: BlobPutResponse = response
            .json()
            .await
            .map_err(|e| DesignError::Parse(format!("Failed to parse storage response: {e}")))?;
        Ok(body.url)
    }

    #[instrument(skip(self))]
    async fn delete(&self, url: &str) -> Result<(), DesignError> {
        self.client
            .delete(url)
            .bearer_auth(self.token.expose_secret())
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn owns(&self, url: &str) -> bool {
        url.strip_prefix(&self.base_url)
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Storage backend for generated images.
#[derive(Debug, Clone)]
pub enum ImageStorage {
    /// Files under `{upload_dir}/designs`, served from `/uploads/designs`.
    Local(UploadStore),
    /// Remote blob storage.
    Blob(BlobClient),
}

impl ImageStorage {
    /// Store one PNG, returning its public URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or upload fails.
    pub async fn store_png(&self, bytes: Vec<u8>) -> Result<String, DesignError> {
        match self {
            Self::Local(store) => Ok(store.save_bytes(DESIGN_DIR, "png", &bytes).await?),
            Self::Blob(blob) => {
                let path = format!("{DESIGN_DIR}/{}.png", Uuid::new_v4());
                blob.put(&path, bytes).await
            }
        }
    }

    /// Delete stored images. Placeholder and foreign URLs are skipped; failures are logged.
    pub async fn remove(&self, urls: &[String]) {
        match self {
            Self::Local(store) => store.discard(urls).await,
            Self::Blob(blob) => {
                for url in urls.iter().filter(|u| blob.owns(u)) {
                    if let Err(e) = blob.delete(url).await {
                        tracing::warn!(error = %e, url = %url, "Failed to delete design image");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_owns_only_its_urls() {
        let blob = BlobClient::new(&BlobStorageConfig {
            base_url: "https://blob.example.com/gemvault/".to_string(),
            token: SecretString::from("token"),
        })
        .unwrap();
        assert!(blob.owns("https://blob.example.com/gemvault/designs/a.png"));
        assert!(!blob.owns("https://blob.example.com/gemvault-other/a.png"));
        assert!(!blob.owns("https://placehold.co/1024x1024?text=Ring"));
    }

    #[tokio::test]
    async fn test_local_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ImageStorage::Local(UploadStore::new(dir.path().to_path_buf()));

        let url = storage.store_png(vec![1, 2, 3]).await.unwrap();
        assert!(url.starts_with("/uploads/designs/"));
        let file_name = url.rsplit('/').next().unwrap();
        let path = dir.path().join(DESIGN_DIR).join(file_name);
        assert!(path.exists());

        storage.remove(&[url]).await;
        assert!(!path.exists());
    }
}
