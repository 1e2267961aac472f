//! Replication Consistency Engine Module
//!
//! Periodic reconciliation of the storage tier and the catalog.
//!
//! ## Core Mechanisms
//! - **Discovery**: builds an inverted file-to-replicas index from every
//!   node's metadata listing, rebuilt between phases.
//! - **Canonicalization**: the replica with the highest timestamp wins;
//!   everything else is overwritten with its content.
//! - **Replica count**: files converge to `nodes/3 + 1` copies, new copies
//!   landing on empty nodes first, surplus copies removed at random.
//! - **Catalog sync**: the catalog ends up describing exactly what storage
//!   holds, without touching application-owned fields.

pub mod engine;
pub mod index;

#[cfg(test)]
mod tests;
