//! Replicated File Store Control Plane Library
//!
//! This library crate defines the core modules of the control plane.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of six loosely coupled subsystems:
//!
//! - **`fleet`**: The fleet controller. Maintains the classified view of the
//!   compute fleet, decides this process's duties and converges each pool to
//!   its target size.
//! - **`health`**: The instance health monitor. Runs persistent liveness
//!   probes against worker and storage instances and deletes the silent ones.
//! - **`consistency`**: The replication consistency engine. Repairs stale
//!   replicas, corrects replica counts and reconciles the catalog.
//! - **`router`**: The request router. Round-robin trackers handing out the
//!   next worker or responder to receive a request.
//! - **`storage`**: Client-side protocol and HTTP client for the storage tier.
//! - **`catalog`**: Client-side protocol and HTTP client for the file catalog.

pub mod catalog;
pub mod config;
pub mod consistency;
pub mod fleet;
pub mod health;
pub mod http;
pub mod router;
pub mod storage;
