use super::protocol::*;
use crate::http::{get_with_retry, post_with_retry};

use anyhow::Result;
use async_trait::async_trait;

const REQUEST_TIMEOUT_MS: u64 = 2_000;
const REQUEST_ATTEMPTS: usize = 3;

/// Remote file operations against a single storage node, keyed by its address.
///
/// The consistency engine only talks to storage through this trait, so the
/// test suite can substitute an in-memory implementation.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Metadata for every file the node holds.
    async fn list_metadata(&self, addr: &str) -> Result<Vec<FileRecordMeta>>;

    /// Full record for one file, `None` if the node does not hold it.
    async fn fetch(&self, addr: &str, file_id: &str) -> Result<Option<FileRecord>>;

    /// Stores a brand-new replica on the node.
    async fn insert(&self, addr: &str, record: &FileRecord) -> Result<()>;

    /// Overwrites an existing replica's fields in place.
    async fn upsert(&self, addr: &str, file_id: &str, update: &FileUpdate) -> Result<()>;

    /// Removes the node's replica of the file.
    async fn remove(&self, addr: &str, file_id: &str) -> Result<()>;
}

pub struct HttpStorageClient {
    http_client: reqwest::Client,
}

impl HttpStorageClient {
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
        }
    }

    fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(REQUEST_TIMEOUT_MS)
    }
}

impl Default for HttpStorageClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for HttpStorageClient {
    async fn list_metadata(&self, addr: &str) -> Result<Vec<FileRecordMeta>> {
        let url = format!("http://{}{}", addr, ENDPOINT_FILES_METADATA);
        let response =
            get_with_retry(&self.http_client, url, self.timeout(), REQUEST_ATTEMPTS).await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Metadata listing failed {}",
                response.status()
            ));
        }

        let listing: ListMetadataResponse = response.json().await?;
        Ok(listing.files)
    }

    async fn fetch(&self, addr: &str, file_id: &str) -> Result<Option<FileRecord>> {
        let url = format!("http://{}{}/{}", addr, ENDPOINT_FILES, file_id);
        let response =
            get_with_retry(&self.http_client, url, self.timeout(), REQUEST_ATTEMPTS).await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(anyhow::anyhow!("File fetch failed {}", response.status()));
        }

        let get_response: GetFileResponse = response.json().await?;
        Ok(get_response.record)
    }

    async fn insert(&self, addr: &str, record: &FileRecord) -> Result<()> {
        let url = format!("http://{}{}", addr, ENDPOINT_FILES);
        let response =
            post_with_retry(&self.http_client, url, record, self.timeout(), REQUEST_ATTEMPTS)
                .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("File insert failed {}", response.status()));
        }
        Ok(())
    }

    async fn upsert(&self, addr: &str, file_id: &str, update: &FileUpdate) -> Result<()> {
        let url = format!("http://{}{}/{}", addr, ENDPOINT_FILES, file_id);
        let response =
            post_with_retry(&self.http_client, url, update, self.timeout(), REQUEST_ATTEMPTS)
                .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("File upsert failed {}", response.status()));
        }
        Ok(())
    }

    async fn remove(&self, addr: &str, file_id: &str) -> Result<()> {
        let url = format!("http://{}{}/{}/delete", addr, ENDPOINT_FILES, file_id);
        let response = post_with_retry(
            &self.http_client,
            url,
            &serde_json::json!({}),
            self.timeout(),
            REQUEST_ATTEMPTS,
        )
        .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("File delete failed {}", response.status()));
        }
        Ok(())
    }
}
