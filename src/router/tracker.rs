use crate::fleet::types::{ComputeNode, FleetView, NodeRole};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Round-robin dispatcher over one pool of the fleet.
///
/// Rotation state is the id of the last node handed out, not an index, so the
/// cursor survives the pool growing, shrinking or reordering between calls.
pub struct NodeTracker {
    view: FleetView,
    pool: NodeRole,
    activation_deadline: Duration,
    last: RwLock<Option<String>>,
}

impl NodeTracker {
    pub fn new(view: FleetView, pool: NodeRole, activation_deadline: Duration) -> Arc<Self> {
        Arc::new(Self {
            view,
            pool,
            activation_deadline,
            last: RwLock::new(None),
        })
    }

    /// Next node in rotation, or `None` when this process has no dispatch
    /// authority or the pool has no healthy serving members.
    pub async fn next(&self) -> Option<ComputeNode> {
        let snapshot = self.view.load().await;
        if !snapshot.is_responder {
            return None;
        }

        let candidates = snapshot.healthy_serving(self.pool, self.activation_deadline.as_secs());
        if candidates.is_empty() {
            return None;
        }

        let mut last = self.last.write().await;

        let chosen = match last
            .as_deref()
            .and_then(|id| candidates.iter().position(|n| n.id == id))
        {
            // Prior pick vanished from the pool, restart from the front.
            None => &candidates[0],
            Some(i) => &candidates[(i + 1) % candidates.len()],
        };

        *last = Some(chosen.id.clone());
        Some(chosen.clone())
    }
}
