use super::provider::{InventoryProvider, NodeListing, NodeMetadata, ProvisioningProvider};
use super::types::{
    now_secs, parse_node_id, ComputeNode, FleetSnapshot, FleetView, NodeRole,
};

use anyhow::Result;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// How many instances each pool should hold.
#[derive(Debug, Clone, Copy)]
pub struct PoolTargets {
    pub coordinators: u32,
    pub workers: u32,
    pub storage: u32,
}

impl PoolTargets {
    pub fn for_role(&self, role: NodeRole) -> u32 {
        match role {
            NodeRole::Coordinator => self.coordinators,
            NodeRole::Worker => self.workers,
            NodeRole::Storage => self.storage,
        }
    }
}

/// True when this process should dispatch incoming requests.
///
/// A lone coordinator both dispatches and runs background duties; with two or
/// more, every coordinator except the highest ordinal dispatches.
pub fn is_responder(ordinal: u32, pool: &[ComputeNode]) -> bool {
    let Some(max) = pool.iter().map(|n| n.ordinal).max() else {
        return false;
    };
    pool.len() == 1 || ordinal != max
}

/// True when this process should run fleet management and consistency duties.
///
/// Exactly the highest-ordinal coordinator, and only once the pool has at
/// least two members; a singleton keeps serving traffic instead.
pub fn is_coordinator(ordinal: u32, pool: &[ComputeNode]) -> bool {
    let Some(max) = pool.iter().map(|n| n.ordinal).max() else {
        return false;
    };
    pool.len() >= 2 && ordinal == max
}

/// Ordinals in `1..=target` that no pool member currently occupies.
pub fn missing_ordinals(target: u32, pool: &[ComputeNode]) -> Vec<u32> {
    (1..=target)
        .filter(|ordinal| !pool.iter().any(|n| n.ordinal == *ordinal))
        .collect()
}

pub struct FleetController<I, P> {
    identity: String,
    targets: PoolTargets,
    activation_deadline: Duration,
    inventory: I,
    provisioning: Arc<P>,
    view: FleetView,
}

impl<I, P> FleetController<I, P>
where
    I: InventoryProvider + 'static,
    P: ProvisioningProvider + 'static,
{
    pub fn new(
        identity: String,
        targets: PoolTargets,
        activation_deadline: Duration,
        inventory: I,
        provisioning: Arc<P>,
        view: FleetView,
    ) -> Arc<Self> {
        Arc::new(Self {
            identity,
            targets,
            activation_deadline,
            inventory,
            provisioning,
            view,
        })
    }

    pub fn view(&self) -> FleetView {
        self.view.clone()
    }

    /// Periodic reconcile loop: refresh, publish, converge.
    pub async fn run(self: Arc<Self>, tick: Duration) {
        let mut interval = tokio::time::interval(tick);

        loop {
            interval.tick().await;
            match self.reconcile().await {
                Ok(snapshot) => {
                    tracing::info!(
                        "Fleet: {} coordinators, {} workers, {} storage nodes (responder={} coordinator={})",
                        snapshot.coordinators.len(),
                        snapshot.workers.len(),
                        snapshot.storage.len(),
                        snapshot.is_responder,
                        snapshot.is_coordinator,
                    );
                }
                Err(e) => {
                    tracing::error!("Fleet reconcile failed: {}", e);
                }
            }
        }
    }

    /// One reconcile pass. Publishes the fresh snapshot before acting on it so
    /// readers never see convergence decisions ahead of the data behind them.
    pub async fn reconcile(&self) -> Result<FleetSnapshot> {
        let snapshot = self.refresh_inventory().await?;
        self.view.publish(snapshot.clone()).await;
        self.ensure_shape(&snapshot);
        Ok(snapshot)
    }

    /// Pulls the instance listing plus per-node metadata and classifies it.
    ///
    /// Metadata fetches fan out concurrently; a node whose metadata cannot be
    /// read is skipped for this cycle rather than guessed at.
    pub async fn refresh_inventory(&self) -> Result<FleetSnapshot> {
        let listings = self.inventory.list_nodes().await?;

        let fleet: Vec<(NodeListing, NodeRole, u32)> = listings
            .into_iter()
            .filter_map(|listing| {
                parse_node_id(&listing.id).map(|(role, ordinal)| (listing, role, ordinal))
            })
            .collect();

        let metadata_futures = fleet
            .iter()
            .map(|(listing, _, _)| self.inventory.node_metadata(&listing.id));
        let metadata: Vec<Result<NodeMetadata>> = join_all(metadata_futures).await;

        let mut nodes = Vec::with_capacity(fleet.len());
        for ((listing, role, ordinal), meta) in fleet.into_iter().zip(metadata) {
            let meta = match meta {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::warn!("Skipping {}: metadata unavailable ({})", listing.id, e);
                    continue;
                }
            };
            nodes.push(ComputeNode {
                id: listing.id,
                role,
                ordinal,
                internal_addr: listing.internal_addr,
                public_addr: listing.public_addr,
                running: listing.running,
                created_at: meta.created_at,
                initialized_at: meta.initialized_at,
                serving: meta.serving,
            });
        }

        Ok(self.classify(nodes))
    }

    fn classify(&self, nodes: Vec<ComputeNode>) -> FleetSnapshot {
        let mut snapshot = FleetSnapshot {
            all: nodes,
            ..Default::default()
        };

        for node in &snapshot.all {
            match node.role {
                NodeRole::Coordinator => snapshot.coordinators.push(node.clone()),
                NodeRole::Worker => snapshot.workers.push(node.clone()),
                NodeRole::Storage => snapshot.storage.push(node.clone()),
            }
        }

        snapshot.this_node = snapshot
            .all
            .iter()
            .find(|n| n.id == self.identity)
            .cloned();

        if let Some(this_node) = &snapshot.this_node {
            if this_node.role == NodeRole::Coordinator {
                snapshot.is_responder = is_responder(this_node.ordinal, &snapshot.coordinators);
                snapshot.is_coordinator = is_coordinator(this_node.ordinal, &snapshot.coordinators);
            }
        }

        snapshot
    }

    /// Drives each pool toward its target size.
    ///
    /// The coordinator pool self-heals from any of its members, otherwise a
    /// dead coordinator could never be replaced. The worker and storage pools
    /// are managed only by the active coordinator.
    fn ensure_shape(&self, snapshot: &FleetSnapshot) {
        let in_coordinator_pool = snapshot
            .this_node
            .as_ref()
            .map(|n| n.role == NodeRole::Coordinator)
            .unwrap_or(false);

        if in_coordinator_pool {
            self.converge_pool(NodeRole::Coordinator, snapshot);
        }
        if snapshot.is_coordinator {
            self.converge_pool(NodeRole::Worker, snapshot);
            self.converge_pool(NodeRole::Storage, snapshot);
        }
    }

    /// Creates instances for missing ordinals and prunes members that blew
    /// their activation deadline. Provisioning calls are fire-and-forget; the
    /// next reconcile pass observes their outcome.
    ///
    /// Missing ordinals are judged against every observed member, healthy or
    /// not. A pruned node frees its ordinal only once it leaves the inventory,
    /// so its replacement is created on a later pass and never races the
    /// in-flight delete.
    fn converge_pool(&self, role: NodeRole, snapshot: &FleetSnapshot) {
        let now = now_secs();
        let deadline_secs = self.activation_deadline.as_secs();
        let pool = snapshot.pool(role);

        let failed: Vec<&ComputeNode> = pool
            .iter()
            .filter(|n| !n.health_good(now, deadline_secs))
            .collect();

        let target = self.targets.for_role(role);

        for ordinal in missing_ordinals(target, pool) {
            let provisioning = self.provisioning.clone();
            tokio::spawn(async move {
                if let Err(e) = provisioning.create_node(role, ordinal).await {
                    tracing::error!("Failed to create {}-{}: {}", role.prefix(), ordinal, e);
                }
            });
        }

        for node in failed {
            tracing::warn!("Pruning {}: activation deadline exceeded", node.id);
            let provisioning = self.provisioning.clone();
            let id = node.id.clone();
            tokio::spawn(async move {
                if let Err(e) = provisioning.delete_node(&id).await {
                    tracing::error!("Failed to delete {}: {}", id, e);
                }
            });
        }
    }
}
