//! Storage Node Wire Protocol
//!
//! Defines the endpoints and DTOs for talking to one storage backend.
//! Storage nodes hold the ground-truth file replicas; everything here is
//! serialized as JSON over HTTP, matching the rest of the cluster.

use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Metadata-only listing of every file a node holds (discovery phase).
pub const ENDPOINT_FILES_METADATA: &str = "/internal/files/metadata";
/// Base path for single-file operations (`GET /internal/files/:id` etc.).
pub const ENDPOINT_FILES: &str = "/internal/files";
/// Lightweight liveness probe used by the instance health monitor.
pub const ENDPOINT_PING: &str = "/internal/ping";

// --- Data Transfer Objects ---

/// One stored copy of a file, as it lives on a storage node.
///
/// `file_id` is unique within a node; the same id on several nodes means
/// several replicas of the same file. `last_updated` (epoch millis) orders
/// competing versions during reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
    pub file_id: String,
    pub file_name: String,
    pub file_contents: String,
    pub content_hash: String,
    pub file_type: String,
    pub last_updated: u64,
    pub owner_id: String,
}

/// The metadata slice of a [`FileRecord`], cheap enough to list in bulk.
///
/// This is what discovery pulls from every node each cycle; contents are
/// only fetched when a repair or replication actually needs them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecordMeta {
    pub file_id: String,
    pub file_name: String,
    pub content_hash: String,
    pub last_updated: u64,
    pub owner_id: String,
}

/// Field set written by an upsert when overwriting a stale replica in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileUpdate {
    pub file_name: String,
    pub file_contents: String,
    pub content_hash: String,
    pub file_type: String,
    pub last_updated: u64,
    pub owner_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListMetadataResponse {
    pub files: Vec<FileRecordMeta>,
}

/// `record` is `None` when the node does not hold the file.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetFileResponse {
    pub record: Option<FileRecord>,
}

impl FileRecord {
    /// Projects the record down to its listing form.
    pub fn meta(&self) -> FileRecordMeta {
        FileRecordMeta {
            file_id: self.file_id.clone(),
            file_name: self.file_name.clone(),
            content_hash: self.content_hash.clone(),
            last_updated: self.last_updated,
            owner_id: self.owner_id.clone(),
        }
    }
}
