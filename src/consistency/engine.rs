use super::index::{ReplicaIndex, ReplicaMeta, resolve_authoritative};
use crate::catalog::client::CatalogStore;
use crate::catalog::types::{CatalogCorrection, CatalogEntry};
use crate::storage::client::StorageBackend;
use crate::storage::protocol::{FileRecord, FileUpdate};

use anyhow::Result;
use futures::future::join_all;
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Reconciles the storage tier against itself and the catalog against the
/// storage tier.
///
/// A cycle runs three phases: stale-replica repair, replica-count correction
/// and catalog reconciliation. Storage is re-discovered between phases so each
/// phase sees the previous one's writes instead of a stale index.
pub struct ConsistencyEngine<S, C> {
    storage: Arc<S>,
    catalog: Arc<C>,
}

impl<S, C> ConsistencyEngine<S, C>
where
    S: StorageBackend,
    C: CatalogStore,
{
    pub fn new(storage: Arc<S>, catalog: Arc<C>) -> Arc<Self> {
        Arc::new(Self { storage, catalog })
    }

    /// One full cycle over the given healthy storage nodes.
    pub async fn run_cycle(&self, nodes: &[String]) -> Result<()> {
        if nodes.is_empty() {
            tracing::warn!("No healthy storage nodes, skipping consistency cycle");
            return Ok(());
        }

        let index = self.discover(nodes).await;
        self.repair_inconsistent(&index).await;

        let index = self.discover(nodes).await;
        self.rebalance_replica_count(&index, nodes).await;

        let index = self.discover(nodes).await;
        self.sync_catalog(&index).await?;

        Ok(())
    }

    /// Builds the replica index from every node's metadata listing.
    ///
    /// A node that fails to answer is treated as holding nothing this cycle.
    /// That can trigger extra replication onto it later, never data loss.
    async fn discover(&self, nodes: &[String]) -> ReplicaIndex {
        let listings = join_all(nodes.iter().map(|addr| self.storage.list_metadata(addr))).await;

        let mut index = ReplicaIndex::new();
        for (addr, listing) in nodes.iter().zip(listings) {
            let listing = match listing {
                Ok(listing) => listing,
                Err(e) => {
                    tracing::warn!("Metadata listing from {} failed: {}", addr, e);
                    continue;
                }
            };
            for meta in listing {
                index.insert(&meta.file_id, ReplicaMeta::from_meta(addr, &meta));
            }
        }

        index
    }

    /// Overwrites every replica that disagrees with the authoritative version
    /// of its file. Per-file failures are logged and left for the next cycle.
    async fn repair_inconsistent(&self, index: &ReplicaIndex) {
        let authoritative = resolve_authoritative(index);

        for (file_id, winner) in &authoritative {
            let stale: Vec<&ReplicaMeta> = index
                .holders(file_id)
                .iter()
                .filter(|r| r.content_hash != winner.content_hash)
                .collect();

            if stale.is_empty() {
                continue;
            }

            // Any replica already carrying the winning hash can serve as source.
            let source = {
                let mut rng = rand::thread_rng();
                let good: Vec<&ReplicaMeta> = index
                    .holders(file_id)
                    .iter()
                    .filter(|r| r.content_hash == winner.content_hash)
                    .collect();
                good.choose(&mut rng)
                    .map(|r| r.node_addr.clone())
                    .unwrap_or_else(|| winner.node_addr.clone())
            };

            let record = match self.fetch_record(&source, file_id).await {
                Ok(record) => record,
                Err(e) => {
                    tracing::error!("Cannot fetch winning copy of {}: {}", file_id, e);
                    continue;
                }
            };

            let update = FileUpdate {
                file_name: record.file_name.clone(),
                file_contents: record.file_contents.clone(),
                content_hash: record.content_hash.clone(),
                file_type: record.file_type.clone(),
                last_updated: record.last_updated,
                owner_id: record.owner_id.clone(),
            };

            let results = join_all(
                stale
                    .iter()
                    .map(|r| self.storage.upsert(&r.node_addr, file_id, &update)),
            )
            .await;

            for (replica, result) in stale.iter().zip(results) {
                match result {
                    Ok(()) => {
                        tracing::info!("Repaired stale copy of {} on {}", file_id, replica.node_addr)
                    }
                    Err(e) => {
                        tracing::error!(
                            "Repair of {} on {} failed: {}",
                            file_id,
                            replica.node_addr,
                            e
                        )
                    }
                }
            }
        }
    }

    /// Brings every file to the desired replica count.
    ///
    /// Under-replicated files are copied onto new nodes, preferring nodes that
    /// currently hold nothing; over-replicated files lose randomly chosen
    /// surplus copies.
    async fn rebalance_replica_count(&self, index: &ReplicaIndex, nodes: &[String]) {
        let desired = desired_replica_count(nodes.len());
        let counts = index.files_per_node(nodes);

        for file_id in index.file_ids() {
            let holders = index.holders(file_id);

            if holders.len() < desired {
                self.add_replicas(file_id, holders, nodes, &counts, desired)
                    .await;
            } else if holders.len() > desired {
                self.drop_replicas(file_id, holders, desired).await;
            }
        }
    }

    async fn add_replicas(
        &self,
        file_id: &str,
        holders: &[ReplicaMeta],
        nodes: &[String],
        counts: &HashMap<String, usize>,
        desired: usize,
    ) {
        let holder_addrs: HashSet<&str> = holders.iter().map(|r| r.node_addr.as_str()).collect();

        // Shuffle for spread, then stable-partition so empty nodes come first.
        let mut candidates: Vec<&String> = nodes
            .iter()
            .filter(|n| !holder_addrs.contains(n.as_str()))
            .collect();
        let source = {
            let mut rng = rand::thread_rng();
            candidates.shuffle(&mut rng);
            holders.choose(&mut rng).cloned()
        };
        candidates.sort_by_key(|n| counts.get(n.as_str()).copied().unwrap_or(0) > 0);

        let needed = desired - holders.len();
        if candidates.len() < needed {
            tracing::warn!(
                "File {} wants {} more copies but only {} nodes are free",
                file_id,
                needed,
                candidates.len()
            );
        }
        let targets = &candidates[..needed.min(candidates.len())];
        if targets.is_empty() {
            return;
        }

        let Some(source) = source else {
            return;
        };
        let record = match self.fetch_record(&source.node_addr, file_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("Cannot fetch {} for replication: {}", file_id, e);
                return;
            }
        };

        let results = join_all(targets.iter().map(|addr| self.storage.insert(addr, &record))).await;

        for (addr, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => tracing::info!("Replicated {} onto {}", file_id, addr),
                Err(e) => tracing::error!("Replication of {} onto {} failed: {}", file_id, addr, e),
            }
        }
    }

    async fn drop_replicas(&self, file_id: &str, holders: &[ReplicaMeta], desired: usize) {
        let surplus: Vec<ReplicaMeta> = {
            let mut rng = rand::thread_rng();
            let mut shuffled: Vec<ReplicaMeta> = holders.to_vec();
            shuffled.shuffle(&mut rng);
            shuffled.truncate(holders.len() - desired);
            shuffled
        };

        let results = join_all(
            surplus
                .iter()
                .map(|r| self.storage.remove(&r.node_addr, file_id)),
        )
        .await;

        for (replica, result) in surplus.iter().zip(results) {
            match result {
                Ok(()) => tracing::info!(
                    "Removed surplus copy of {} from {}",
                    file_id,
                    replica.node_addr
                ),
                Err(e) => tracing::error!(
                    "Removal of {} from {} failed: {}",
                    file_id,
                    replica.node_addr,
                    e
                ),
            }
        }
    }

    /// Makes the catalog describe exactly what storage holds.
    ///
    /// Entries for vanished files are deleted, unknown files are inserted, and
    /// entries whose storage-derived fields drifted are corrected in place.
    /// Application-owned fields are never written on existing entries.
    async fn sync_catalog(&self, index: &ReplicaIndex) -> Result<()> {
        let entries = self.catalog.list().await?;
        let cataloged: HashMap<&str, &CatalogEntry> =
            entries.iter().map(|e| (e.file_id.as_str(), e)).collect();
        let stored: HashSet<&str> = index.file_ids().map(String::as_str).collect();

        let orphaned: Vec<&CatalogEntry> = entries
            .iter()
            .filter(|e| !stored.contains(e.file_id.as_str()))
            .collect();
        let results = join_all(orphaned.iter().map(|e| self.catalog.delete(&e.file_id))).await;
        for (entry, result) in orphaned.iter().zip(results) {
            match result {
                Ok(()) => tracing::info!("Purged catalog entry for vanished file {}", entry.file_id),
                Err(e) => tracing::error!("Purge of {} failed: {}", entry.file_id, e),
            }
        }

        for (file_id, replicas) in index.files() {
            let Some(truth) = storage_truth(replicas) else {
                continue;
            };

            match cataloged.get(file_id.as_str()) {
                None => {
                    let entry = CatalogEntry {
                        file_id: file_id.clone(),
                        file_name: truth.file_name.clone(),
                        content_hash: truth.content_hash.clone(),
                        last_updated: truth.last_updated,
                        owner_id: truth.owner_id.clone(),
                        storage_locations: truth.storage_locations.clone(),
                        course_ids: Vec::new(),
                        read_only_user_ids: Vec::new(),
                    };
                    match self.catalog.insert(&entry).await {
                        Ok(()) => tracing::info!("Cataloged unknown file {}", file_id),
                        Err(e) => tracing::error!("Catalog insert of {} failed: {}", file_id, e),
                    }
                }
                Some(entry) => {
                    if entry_matches(entry, &truth) {
                        continue;
                    }
                    match self.catalog.correct(file_id, &truth).await {
                        Ok(()) => tracing::info!("Corrected catalog entry for {}", file_id),
                        Err(e) => {
                            tracing::error!("Catalog correction of {} failed: {}", file_id, e)
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn fetch_record(&self, addr: &str, file_id: &str) -> Result<FileRecord> {
        self.storage
            .fetch(addr, file_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("{} no longer holds {}", addr, file_id))
    }
}

/// One extra copy for every three healthy storage nodes, at least one.
pub fn desired_replica_count(healthy_nodes: usize) -> usize {
    healthy_nodes / 3 + 1
}

/// What the catalog should say about a file, derived from its replicas.
///
/// After repair all replicas agree on content, so the first one supplies the
/// descriptive fields; the timestamp is the maximum across replicas and the
/// locations are sorted for stable comparison.
fn storage_truth(replicas: &[ReplicaMeta]) -> Option<CatalogCorrection> {
    let first = replicas.first()?;
    let mut storage_locations: Vec<String> =
        replicas.iter().map(|r| r.node_addr.clone()).collect();
    storage_locations.sort();

    Some(CatalogCorrection {
        file_name: first.file_name.clone(),
        content_hash: first.content_hash.clone(),
        last_updated: replicas.iter().map(|r| r.last_updated).max().unwrap_or(0),
        owner_id: first.owner_id.clone(),
        storage_locations,
    })
}

fn entry_matches(entry: &CatalogEntry, truth: &CatalogCorrection) -> bool {
    let mut entry_locations = entry.storage_locations.clone();
    entry_locations.sort();

    entry.file_name == truth.file_name
        && entry.content_hash == truth.content_hash
        && entry.last_updated == truth.last_updated
        && entry.owner_id == truth.owner_id
        && entry_locations == truth.storage_locations
}
