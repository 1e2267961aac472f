//! Catalog Wire Protocol
//!
//! Endpoints and DTOs for the catalog service holding the file index.

use super::types::{CatalogCorrection, CatalogEntry};
use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Base path for entry operations (`GET /catalog/files`, `GET /catalog/files/:id`).
pub const ENDPOINT_CATALOG_FILES: &str = "/catalog/files";

// --- Data Transfer Objects ---

#[derive(Debug, Serialize, Deserialize)]
pub struct ListEntriesResponse {
    pub entries: Vec<CatalogEntry>,
}

/// `entry` is `None` when the catalog has no record of the file.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetEntryResponse {
    pub entry: Option<CatalogEntry>,
}

/// Whole-field correction of an existing entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct CorrectEntryRequest {
    pub correction: CatalogCorrection,
}

/// Atomic add/remove of one value in one of the entry's array fields.
#[derive(Debug, Serialize, Deserialize)]
pub struct SetOpRequest {
    pub field: String,
    pub value: String,
}
