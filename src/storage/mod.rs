//! Storage Backend Module
//!
//! Client-side view of the storage tier: the nodes that hold the actual file
//! replicas.
//!
//! ## Core Concepts
//! - **Protocol**: JSON-over-HTTP endpoints and DTOs shared with the storage nodes.
//! - **Client**: `StorageBackend` trait plus the `HttpStorageClient` implementation
//!   with retry/backoff, so callers never talk raw HTTP.
//!
//! The consistency engine drives all replica reads and writes through this module.

pub mod client;
pub mod protocol;
