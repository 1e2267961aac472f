//! Fleet Controller Module
//!
//! Maintains the live picture of the compute fleet and keeps its shape at the
//! configured targets.
//!
//! ## Core Mechanisms
//! - **Inventory refresh**: periodically lists instances and fetches per-node
//!   metadata, classifying everything into coordinator/worker/storage pools.
//! - **Role determination**: derives responder and coordinator duties for this
//!   process from its ordinal within the coordinator pool.
//! - **Shape convergence**: creates instances for missing ordinals and prunes
//!   members that never became healthy within the activation window.
//!
//! The published `FleetSnapshot` is the single source of cluster topology for
//! every other module.

pub mod controller;
pub mod handlers;
pub mod provider;
pub mod types;
