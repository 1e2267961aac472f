use crate::storage::protocol::FileRecordMeta;

use std::collections::HashMap;

/// One replica of a file as seen during discovery: which node holds it and
/// what version it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaMeta {
    pub node_addr: String,
    pub file_name: String,
    pub content_hash: String,
    pub last_updated: u64,
    pub owner_id: String,
}

impl ReplicaMeta {
    pub fn from_meta(node_addr: &str, meta: &FileRecordMeta) -> Self {
        Self {
            node_addr: node_addr.to_string(),
            file_name: meta.file_name.clone(),
            content_hash: meta.content_hash.clone(),
            last_updated: meta.last_updated,
            owner_id: meta.owner_id.clone(),
        }
    }
}

/// Inverted view of the storage tier built once per phase: file id to the
/// replicas currently holding it. Immutable while a phase reads it.
#[derive(Debug, Default)]
pub struct ReplicaIndex {
    files: HashMap<String, Vec<ReplicaMeta>>,
}

impl ReplicaIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file_id: &str, replica: ReplicaMeta) {
        self.files
            .entry(file_id.to_string())
            .or_default()
            .push(replica);
    }

    pub fn file_ids(&self) -> impl Iterator<Item = &String> {
        self.files.keys()
    }

    pub fn holders(&self, file_id: &str) -> &[ReplicaMeta] {
        self.files.get(file_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn files(&self) -> &HashMap<String, Vec<ReplicaMeta>> {
        &self.files
    }

    /// How many files each known node holds. Nodes in `all_nodes` that hold
    /// nothing appear with a count of zero.
    pub fn files_per_node(&self, all_nodes: &[String]) -> HashMap<String, usize> {
        let mut counts: HashMap<String, usize> =
            all_nodes.iter().map(|n| (n.clone(), 0)).collect();
        for replicas in self.files.values() {
            for replica in replicas {
                *counts.entry(replica.node_addr.clone()).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// Picks the authoritative replica of every file: the one with the highest
/// `last_updated`. Ties keep the first replica encountered, so repeated runs
/// over the same index agree.
pub fn resolve_authoritative(index: &ReplicaIndex) -> HashMap<String, ReplicaMeta> {
    let mut authoritative = HashMap::new();

    for (file_id, replicas) in index.files() {
        let Some(first) = replicas.first() else {
            continue;
        };
        let mut best = first;
        for replica in &replicas[1..] {
            if replica.last_updated > best.last_updated {
                best = replica;
            }
        }
        authoritative.insert(file_id.clone(), best.clone());
    }

    authoritative
}
