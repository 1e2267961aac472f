//! Catalog Module
//!
//! Client-side view of the catalog service: the index that says which files
//! exist, where their replicas live and which version is current.
//!
//! ## Core Concepts
//! - **Entries**: one `CatalogEntry` per file; storage-derived fields are owned
//!   by the consistency engine, the course/reader lists by the application.
//! - **Set operations**: atomic add/remove on the entry's array fields so
//!   concurrent writers never clobber each other.

pub mod client;
pub mod protocol;
pub mod types;
