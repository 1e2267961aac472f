use super::protocol::*;
use super::types::{CatalogCorrection, CatalogEntry, SetField};
use crate::http::{get_with_retry, post_with_retry};

use anyhow::Result;
use async_trait::async_trait;

const REQUEST_TIMEOUT_MS: u64 = 2_000;
const REQUEST_ATTEMPTS: usize = 3;

/// Operations against the catalog service.
///
/// `insert`, `correct` and `delete` carry the reconciliation traffic; the set
/// operations are for application code that attaches courses or readers to an
/// entry without racing other writers.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get(&self, file_id: &str) -> Result<Option<CatalogEntry>>;

    async fn list(&self) -> Result<Vec<CatalogEntry>>;

    async fn insert(&self, entry: &CatalogEntry) -> Result<()>;

    /// Overwrites the storage-derived fields of an existing entry, leaving
    /// `course_ids` and `read_only_user_ids` alone.
    async fn correct(&self, file_id: &str, correction: &CatalogCorrection) -> Result<()>;

    async fn delete(&self, file_id: &str) -> Result<()>;

    /// Atomically adds `value` to one of the entry's array fields.
    async fn add_to_set(&self, file_id: &str, field: SetField, value: &str) -> Result<()>;

    /// Atomically removes `value` from one of the entry's array fields.
    async fn remove_from_set(&self, file_id: &str, field: SetField, value: &str) -> Result<()>;
}

pub struct HttpCatalogClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpCatalogClient {
    /// `base_url` is the catalog service address, e.g. `catalog.internal:4100`.
    pub fn new(base_url: &str) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, suffix: &str) -> String {
        format!("http://{}{}{}", self.base_url, ENDPOINT_CATALOG_FILES, suffix)
    }

    fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(REQUEST_TIMEOUT_MS)
    }

    async fn set_op(&self, path: String, field: SetField, value: &str) -> Result<()> {
        let payload = SetOpRequest {
            field: field.field_name().to_string(),
            value: value.to_string(),
        };
        let response =
            post_with_retry(&self.http_client, path, &payload, self.timeout(), REQUEST_ATTEMPTS)
                .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Catalog set operation failed {}",
                response.status()
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for HttpCatalogClient {
    async fn get(&self, file_id: &str) -> Result<Option<CatalogEntry>> {
        let response = get_with_retry(
            &self.http_client,
            self.url(&format!("/{}", file_id)),
            self.timeout(),
            REQUEST_ATTEMPTS,
        )
        .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Catalog get failed {}", response.status()));
        }

        let get_response: GetEntryResponse = response.json().await?;
        Ok(get_response.entry)
    }

    async fn list(&self) -> Result<Vec<CatalogEntry>> {
        let response =
            get_with_retry(&self.http_client, self.url(""), self.timeout(), REQUEST_ATTEMPTS)
                .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Catalog list failed {}", response.status()));
        }

        let listing: ListEntriesResponse = response.json().await?;
        Ok(listing.entries)
    }

    async fn insert(&self, entry: &CatalogEntry) -> Result<()> {
        let response = post_with_retry(
            &self.http_client,
            self.url(""),
            entry,
            self.timeout(),
            REQUEST_ATTEMPTS,
        )
        .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Catalog insert failed {}",
                response.status()
            ));
        }
        Ok(())
    }

    async fn correct(&self, file_id: &str, correction: &CatalogCorrection) -> Result<()> {
        let payload = CorrectEntryRequest {
            correction: correction.clone(),
        };
        let response = post_with_retry(
            &self.http_client,
            self.url(&format!("/{}", file_id)),
            &payload,
            self.timeout(),
            REQUEST_ATTEMPTS,
        )
        .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Catalog correction failed {}",
                response.status()
            ));
        }
        Ok(())
    }

    async fn delete(&self, file_id: &str) -> Result<()> {
        let response = post_with_retry(
            &self.http_client,
            self.url(&format!("/{}/delete", file_id)),
            &serde_json::json!({}),
            self.timeout(),
            REQUEST_ATTEMPTS,
        )
        .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Catalog delete failed {}",
                response.status()
            ));
        }
        Ok(())
    }

    async fn add_to_set(&self, file_id: &str, field: SetField, value: &str) -> Result<()> {
        self.set_op(self.url(&format!("/{}/set/add", file_id)), field, value)
            .await
    }

    async fn remove_from_set(&self, file_id: &str, field: SetField, value: &str) -> Result<()> {
        self.set_op(self.url(&format!("/{}/set/remove", file_id)), field, value)
            .await
    }
}
