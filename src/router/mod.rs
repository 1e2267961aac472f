//! Request Router Module
//!
//! Round-robin selection of the next node to receive work, one tracker per
//! pool, gated on whether this process currently holds dispatch authority.

pub mod tracker;
