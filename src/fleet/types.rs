use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NodeRole {
    Coordinator,
    Worker,
    Storage,
}

impl NodeRole {
    /// Name prefix that instances of this role carry, e.g. `coordinator-2`.
    pub fn prefix(&self) -> &'static str {
        match self {
            NodeRole::Coordinator => "coordinator",
            NodeRole::Worker => "worker",
            NodeRole::Storage => "storage",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "coordinator" => Some(NodeRole::Coordinator),
            "worker" => Some(NodeRole::Worker),
            "storage" => Some(NodeRole::Storage),
            _ => None,
        }
    }
}

/// Splits a node id of the form `<role>-<ordinal>` into its parts.
///
/// Anything that does not match (unknown prefix, missing or non-numeric
/// ordinal) is not part of the fleet and yields `None`.
pub fn parse_node_id(id: &str) -> Option<(NodeRole, u32)> {
    let (prefix, ordinal) = id.rsplit_once('-')?;
    let role = NodeRole::from_prefix(prefix)?;
    let ordinal: u32 = ordinal.parse().ok()?;
    Some((role, ordinal))
}

/// One compute instance as last observed by the inventory refresh.
///
/// `created_at`/`initialized_at` are epoch seconds; `None` means the instance
/// has not reported that milestone yet. `serving` is true once the startup
/// status reads ready.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComputeNode {
    pub id: String,
    pub role: NodeRole,
    pub ordinal: u32,
    pub internal_addr: String,
    pub public_addr: Option<String>,
    pub running: bool,
    pub created_at: Option<u64>,
    pub initialized_at: Option<u64>,
    pub serving: bool,
}

impl ComputeNode {
    /// Health verdict used by shape convergence.
    ///
    /// A node is good while its creation time is unknown (still coming up and
    /// unjudgeable), once it is running and serving, or while it is still
    /// inside the activation window after creation.
    pub fn health_good(&self, now_secs: u64, activation_deadline_secs: u64) -> bool {
        let Some(created_at) = self.created_at else {
            return true;
        };
        if self.running && self.serving {
            return true;
        }
        now_secs <= created_at + activation_deadline_secs
    }

    /// Ready to take traffic.
    pub fn ready(&self) -> bool {
        self.running && self.serving
    }
}

/// Immutable classified view of the fleet, republished after every refresh.
#[derive(Debug, Clone, Default)]
pub struct FleetSnapshot {
    pub all: Vec<ComputeNode>,
    pub coordinators: Vec<ComputeNode>,
    pub workers: Vec<ComputeNode>,
    pub storage: Vec<ComputeNode>,
    pub this_node: Option<ComputeNode>,
    pub is_responder: bool,
    pub is_coordinator: bool,
}

impl FleetSnapshot {
    pub fn pool(&self, role: NodeRole) -> &[ComputeNode] {
        match role {
            NodeRole::Coordinator => &self.coordinators,
            NodeRole::Worker => &self.workers,
            NodeRole::Storage => &self.storage,
        }
    }

    /// Members of the pool that are running, serving and pass the health check.
    pub fn healthy_serving(&self, role: NodeRole, activation_deadline_secs: u64) -> Vec<ComputeNode> {
        let now_secs = now_secs();
        self.pool(role)
            .iter()
            .filter(|n| n.ready() && n.health_good(now_secs, activation_deadline_secs))
            .cloned()
            .collect()
    }
}

/// Shared handle to the latest snapshot. Readers grab an `Arc` and work on a
/// consistent view; the controller swaps in a fresh one atomically.
#[derive(Clone)]
pub struct FleetView {
    inner: Arc<RwLock<Arc<FleetSnapshot>>>,
}

impl FleetView {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(FleetSnapshot::default()))),
        }
    }

    pub async fn load(&self) -> Arc<FleetSnapshot> {
        self.inner.read().await.clone()
    }

    pub async fn publish(&self, snapshot: FleetSnapshot) {
        *self.inner.write().await = Arc::new(snapshot);
    }
}

impl Default for FleetView {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
