//! Instance Health Monitor Module
//!
//! Persistent liveness probes against worker and storage instances, run only
//! by the active coordinator. Silence past the staleness window gets the
//! instance deleted; the fleet controller provisions the replacement.

pub mod monitor;
