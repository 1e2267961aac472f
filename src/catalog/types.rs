use serde::{Deserialize, Serialize};

/// One file's entry in the authoritative catalog.
///
/// The catalog records where a file's replicas live and which version they
/// should carry; the consistency engine keeps the storage-derived fields in
/// sync with the storage tier and never touches the application-owned ones
/// (`course_ids`, `read_only_user_ids`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub file_id: String,
    pub file_name: String,
    pub content_hash: String,
    pub last_updated: u64,
    pub owner_id: String,
    pub storage_locations: Vec<String>,
    pub course_ids: Vec<String>,
    pub read_only_user_ids: Vec<String>,
}

/// The storage-derived field set written when correcting an existing entry.
///
/// Deliberately excludes `course_ids` and `read_only_user_ids`; corrections
/// must leave those untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogCorrection {
    pub file_name: String,
    pub content_hash: String,
    pub last_updated: u64,
    pub owner_id: String,
    pub storage_locations: Vec<String>,
}

/// The array fields a catalog entry supports atomic add/remove on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetField {
    StorageLocations,
    CourseIds,
    ReadOnlyUserIds,
}

impl SetField {
    pub fn field_name(&self) -> &'static str {
        match self {
            SetField::StorageLocations => "storage_locations",
            SetField::CourseIds => "course_ids",
            SetField::ReadOnlyUserIds => "read_only_user_ids",
        }
    }
}
