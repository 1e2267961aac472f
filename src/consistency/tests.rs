//! Consistency Module Tests
//!
//! Drives full reconciliation cycles against in-memory storage and catalog
//! fakes, checking convergence, idempotence and the placement preference for
//! empty nodes.

#[cfg(test)]
mod tests {
    use crate::catalog::client::CatalogStore;
    use crate::catalog::types::{CatalogCorrection, CatalogEntry, SetField};
    use crate::consistency::engine::{ConsistencyEngine, desired_replica_count};
    use crate::consistency::index::{ReplicaIndex, ReplicaMeta, resolve_authoritative};
    use crate::storage::client::StorageBackend;
    use crate::storage::protocol::{FileRecord, FileRecordMeta, FileUpdate};
    use anyhow::Result;
    use async_trait::async_trait;
    use dashmap::DashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ============================================================
    // IN-MEMORY FAKES
    // ============================================================

    #[derive(Default)]
    struct MemStorage {
        nodes: DashMap<String, DashMap<String, FileRecord>>,
        writes: AtomicUsize,
    }

    impl MemStorage {
        fn with_nodes(addrs: &[&str]) -> Arc<Self> {
            let storage = Self::default();
            for addr in addrs {
                storage.nodes.insert(addr.to_string(), DashMap::new());
            }
            Arc::new(storage)
        }

        fn put(&self, addr: &str, record: FileRecord) {
            self.nodes
                .get(addr)
                .expect("unknown test node")
                .insert(record.file_id.clone(), record);
        }

        fn holders(&self, file_id: &str) -> Vec<String> {
            let mut holders: Vec<String> = self
                .nodes
                .iter()
                .filter(|n| n.value().contains_key(file_id))
                .map(|n| n.key().clone())
                .collect();
            holders.sort();
            holders
        }

        fn record_on(&self, addr: &str, file_id: &str) -> Option<FileRecord> {
            self.nodes.get(addr)?.get(file_id).map(|r| r.clone())
        }

        fn write_count(&self) -> usize {
            self.writes.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl StorageBackend for MemStorage {
        async fn list_metadata(&self, addr: &str) -> Result<Vec<FileRecordMeta>> {
            let node = self
                .nodes
                .get(addr)
                .ok_or_else(|| anyhow::anyhow!("node {} unreachable", addr))?;
            Ok(node.iter().map(|r| r.value().meta()).collect())
        }

        async fn fetch(&self, addr: &str, file_id: &str) -> Result<Option<FileRecord>> {
            let node = self
                .nodes
                .get(addr)
                .ok_or_else(|| anyhow::anyhow!("node {} unreachable", addr))?;
            Ok(node.get(file_id).map(|r| r.clone()))
        }

        async fn insert(&self, addr: &str, record: &FileRecord) -> Result<()> {
            self.writes.fetch_add(1, Ordering::Relaxed);
            self.nodes
                .get(addr)
                .ok_or_else(|| anyhow::anyhow!("node {} unreachable", addr))?
                .insert(record.file_id.clone(), record.clone());
            Ok(())
        }

        async fn upsert(&self, addr: &str, file_id: &str, update: &FileUpdate) -> Result<()> {
            self.writes.fetch_add(1, Ordering::Relaxed);
            self.put(
                addr,
                FileRecord {
                    file_id: file_id.to_string(),
                    file_name: update.file_name.clone(),
                    file_contents: update.file_contents.clone(),
                    content_hash: update.content_hash.clone(),
                    file_type: update.file_type.clone(),
                    last_updated: update.last_updated,
                    owner_id: update.owner_id.clone(),
                },
            );
            Ok(())
        }

        async fn remove(&self, addr: &str, file_id: &str) -> Result<()> {
            self.writes.fetch_add(1, Ordering::Relaxed);
            self.nodes
                .get(addr)
                .ok_or_else(|| anyhow::anyhow!("node {} unreachable", addr))?
                .remove(file_id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemCatalog {
        entries: DashMap<String, CatalogEntry>,
        writes: AtomicUsize,
    }

    impl MemCatalog {
        fn entry(&self, file_id: &str) -> Option<CatalogEntry> {
            self.entries.get(file_id).map(|e| e.clone())
        }

        fn write_count(&self) -> usize {
            self.writes.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl CatalogStore for MemCatalog {
        async fn get(&self, file_id: &str) -> Result<Option<CatalogEntry>> {
            Ok(self.entries.get(file_id).map(|e| e.clone()))
        }

        async fn list(&self) -> Result<Vec<CatalogEntry>> {
            Ok(self.entries.iter().map(|e| e.clone()).collect())
        }

        async fn insert(&self, entry: &CatalogEntry) -> Result<()> {
            self.writes.fetch_add(1, Ordering::Relaxed);
            self.entries.insert(entry.file_id.clone(), entry.clone());
            Ok(())
        }

        async fn correct(&self, file_id: &str, correction: &CatalogCorrection) -> Result<()> {
            self.writes.fetch_add(1, Ordering::Relaxed);
            let mut entry = self
                .entries
                .get_mut(file_id)
                .ok_or_else(|| anyhow::anyhow!("no entry {}", file_id))?;
            entry.file_name = correction.file_name.clone();
            entry.content_hash = correction.content_hash.clone();
            entry.last_updated = correction.last_updated;
            entry.owner_id = correction.owner_id.clone();
            entry.storage_locations = correction.storage_locations.clone();
            Ok(())
        }

        async fn delete(&self, file_id: &str) -> Result<()> {
            self.writes.fetch_add(1, Ordering::Relaxed);
            self.entries.remove(file_id);
            Ok(())
        }

        async fn add_to_set(&self, file_id: &str, field: SetField, value: &str) -> Result<()> {
            self.writes.fetch_add(1, Ordering::Relaxed);
            let mut entry = self
                .entries
                .get_mut(file_id)
                .ok_or_else(|| anyhow::anyhow!("no entry {}", file_id))?;
            let set = match field {
                SetField::StorageLocations => &mut entry.storage_locations,
                SetField::CourseIds => &mut entry.course_ids,
                SetField::ReadOnlyUserIds => &mut entry.read_only_user_ids,
            };
            if !set.contains(&value.to_string()) {
                set.push(value.to_string());
            }
            Ok(())
        }

        async fn remove_from_set(&self, file_id: &str, field: SetField, value: &str) -> Result<()> {
            self.writes.fetch_add(1, Ordering::Relaxed);
            let mut entry = self
                .entries
                .get_mut(file_id)
                .ok_or_else(|| anyhow::anyhow!("no entry {}", file_id))?;
            let set = match field {
                SetField::StorageLocations => &mut entry.storage_locations,
                SetField::CourseIds => &mut entry.course_ids,
                SetField::ReadOnlyUserIds => &mut entry.read_only_user_ids,
            };
            set.retain(|v| v != value);
            Ok(())
        }
    }

    fn record(file_id: &str, hash: &str, ts: u64) -> FileRecord {
        FileRecord {
            file_id: file_id.to_string(),
            file_name: format!("{}.txt", file_id),
            file_contents: format!("contents-{}", hash),
            content_hash: hash.to_string(),
            file_type: "text/plain".to_string(),
            last_updated: ts,
            owner_id: "owner-1".to_string(),
        }
    }

    fn entry_for(storage: &MemStorage, file_id: &str) -> CatalogEntry {
        let holders = storage.holders(file_id);
        let sample = storage.record_on(&holders[0], file_id).unwrap();
        let max_ts = holders
            .iter()
            .map(|h| storage.record_on(h, file_id).unwrap().last_updated)
            .max()
            .unwrap();
        CatalogEntry {
            file_id: file_id.to_string(),
            file_name: sample.file_name,
            content_hash: sample.content_hash,
            last_updated: max_ts,
            owner_id: sample.owner_id,
            storage_locations: holders,
            course_ids: Vec::new(),
            read_only_user_ids: Vec::new(),
        }
    }

    fn nodes(addrs: &[&str]) -> Vec<String> {
        addrs.iter().map(|a| a.to_string()).collect()
    }

    // ============================================================
    // FULL-CYCLE SCENARIOS
    // ============================================================

    #[tokio::test]
    async fn test_divergent_copies_converge_on_newest() {
        // Three divergent copies plus one empty node. The newest copy must
        // win everywhere, then the count must drop to the desired two.
        let storage = MemStorage::with_nodes(&["n1", "n2", "n3", "n4"]);
        storage.put("n1", record("f1", "hash-old", 100));
        storage.put("n2", record("f1", "hash-other", 100));
        storage.put("n3", record("f1", "hash-new", 200));
        let catalog = Arc::new(MemCatalog::default());

        let engine = ConsistencyEngine::new(storage.clone(), catalog.clone());
        engine
            .run_cycle(&nodes(&["n1", "n2", "n3", "n4"]))
            .await
            .unwrap();

        let holders = storage.holders("f1");
        assert_eq!(holders.len(), 2, "desired count for 4 nodes is 2");
        for holder in &holders {
            let copy = storage.record_on(holder, "f1").unwrap();
            assert_eq!(copy.content_hash, "hash-new");
            assert_eq!(copy.last_updated, 200);
        }

        let entry = catalog.entry("f1").unwrap();
        assert_eq!(entry.content_hash, "hash-new");
        assert_eq!(entry.last_updated, 200);
        assert_eq!(entry.storage_locations, holders);
    }

    #[tokio::test]
    async fn test_stale_catalog_entries_are_purged() {
        let storage = MemStorage::with_nodes(&["n1", "n2"]);
        let catalog = Arc::new(MemCatalog::default());
        for file_id in ["ghost-1", "ghost-2"] {
            catalog
                .entries
                .insert(file_id.to_string(), entry_stub(file_id));
        }

        let engine = ConsistencyEngine::new(storage, catalog.clone());
        engine.run_cycle(&nodes(&["n1", "n2"])).await.unwrap();

        assert!(catalog.entries.is_empty());
    }

    fn entry_stub(file_id: &str) -> CatalogEntry {
        CatalogEntry {
            file_id: file_id.to_string(),
            file_name: format!("{}.txt", file_id),
            content_hash: "whatever".to_string(),
            last_updated: 1,
            owner_id: "owner-1".to_string(),
            storage_locations: vec!["n1".to_string()],
            course_ids: Vec::new(),
            read_only_user_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_idle_fleet_stays_untouched() {
        // Consistent replicas at the desired count, catalog in sync, plus a
        // brand-new empty node. Nothing should be written anywhere.
        let storage = MemStorage::with_nodes(&["n1", "n2", "n3", "n4"]);
        storage.put("n1", record("f1", "hash-a", 100));
        storage.put("n2", record("f1", "hash-a", 100));
        let catalog = Arc::new(MemCatalog::default());
        catalog
            .entries
            .insert("f1".to_string(), entry_for(&storage, "f1"));

        let engine = ConsistencyEngine::new(storage.clone(), catalog.clone());
        engine
            .run_cycle(&nodes(&["n1", "n2", "n3", "n4"]))
            .await
            .unwrap();

        assert_eq!(storage.write_count(), 0);
        assert_eq!(catalog.write_count(), 0);
    }

    #[tokio::test]
    async fn test_second_cycle_is_idempotent() {
        let storage = MemStorage::with_nodes(&["n1", "n2", "n3", "n4"]);
        storage.put("n1", record("f1", "hash-old", 100));
        storage.put("n2", record("f1", "hash-new", 200));
        storage.put("n3", record("f2", "hash-b", 50));
        let catalog = Arc::new(MemCatalog::default());

        let engine = ConsistencyEngine::new(storage.clone(), catalog.clone());
        let all = nodes(&["n1", "n2", "n3", "n4"]);

        engine.run_cycle(&all).await.unwrap();
        let storage_writes = storage.write_count();
        let catalog_writes = catalog.write_count();
        assert!(storage_writes > 0);
        assert!(catalog_writes > 0);

        engine.run_cycle(&all).await.unwrap();
        assert_eq!(storage.write_count(), storage_writes);
        assert_eq!(catalog.write_count(), catalog_writes);
    }

    // ============================================================
    // REPLICA COUNT CORRECTION
    // ============================================================

    #[tokio::test]
    async fn test_under_replicated_file_gains_copies() {
        let storage = MemStorage::with_nodes(&["n1", "n2", "n3", "n4", "n5", "n6"]);
        storage.put("n1", record("f1", "hash-a", 100));
        let catalog = Arc::new(MemCatalog::default());

        let engine = ConsistencyEngine::new(storage.clone(), catalog);
        engine
            .run_cycle(&nodes(&["n1", "n2", "n3", "n4", "n5", "n6"]))
            .await
            .unwrap();

        // Six nodes want three copies.
        let holders = storage.holders("f1");
        assert_eq!(holders.len(), desired_replica_count(6));
        for holder in &holders {
            assert_eq!(
                storage.record_on(holder, "f1").unwrap().file_contents,
                "contents-hash-a"
            );
        }
    }

    #[tokio::test]
    async fn test_over_replicated_file_loses_copies() {
        let storage = MemStorage::with_nodes(&["n1", "n2", "n3"]);
        for addr in ["n1", "n2", "n3"] {
            storage.put(addr, record("f1", "hash-a", 100));
        }
        let catalog = Arc::new(MemCatalog::default());

        let engine = ConsistencyEngine::new(storage.clone(), catalog);
        engine.run_cycle(&nodes(&["n1", "n2", "n3"])).await.unwrap();

        assert_eq!(storage.holders("f1").len(), desired_replica_count(3));
    }

    #[tokio::test]
    async fn test_new_copies_prefer_empty_nodes() {
        // f1 needs one more copy. n2 and n3 already hold files, n4 and n5 are
        // empty; the new copy must land on an empty node.
        let storage = MemStorage::with_nodes(&["n1", "n2", "n3", "n4", "n5"]);
        storage.put("n1", record("f1", "hash-a", 100));
        storage.put("n2", record("f2", "hash-b", 100));
        storage.put("n3", record("f2", "hash-b", 100));
        let catalog = Arc::new(MemCatalog::default());

        let engine = ConsistencyEngine::new(storage.clone(), catalog);
        engine
            .run_cycle(&nodes(&["n1", "n2", "n3", "n4", "n5"]))
            .await
            .unwrap();

        let holders = storage.holders("f1");
        assert_eq!(holders.len(), 2);
        let new_holder = holders.iter().find(|h| h.as_str() != "n1").unwrap();
        assert!(
            new_holder == "n4" || new_holder == "n5",
            "copy landed on occupied node {}",
            new_holder
        );
    }

    // ============================================================
    // FAILURE HANDLING
    // ============================================================

    #[tokio::test]
    async fn test_unreachable_node_is_treated_as_empty() {
        // Discovery skips the silent node; the rest of the pipeline still
        // completes, purging the stale entry and cataloging the live file.
        let storage = MemStorage::with_nodes(&["n1"]);
        storage.put("n1", record("f1", "hash-a", 100));
        let catalog = Arc::new(MemCatalog::default());
        catalog
            .entries
            .insert("ghost".to_string(), entry_stub("ghost"));

        let engine = ConsistencyEngine::new(storage.clone(), catalog.clone());
        engine.run_cycle(&nodes(&["n1", "n-gone"])).await.unwrap();

        assert!(catalog.entry("ghost").is_none());
        let entry = catalog.entry("f1").unwrap();
        assert_eq!(entry.storage_locations, vec!["n1".to_string()]);
        assert_eq!(storage.write_count(), 0);
    }

    // ============================================================
    // CATALOG FIELD OWNERSHIP
    // ============================================================

    #[tokio::test]
    async fn test_inserted_entries_start_without_application_fields() {
        let storage = MemStorage::with_nodes(&["n1", "n2"]);
        storage.put("n1", record("f1", "hash-a", 100));
        let catalog = Arc::new(MemCatalog::default());

        let engine = ConsistencyEngine::new(storage, catalog.clone());
        engine.run_cycle(&nodes(&["n1", "n2"])).await.unwrap();

        let entry = catalog.entry("f1").unwrap();
        assert!(entry.course_ids.is_empty());
        assert!(entry.read_only_user_ids.is_empty());
    }

    #[tokio::test]
    async fn test_corrections_preserve_application_fields() {
        let storage = MemStorage::with_nodes(&["n1", "n2"]);
        storage.put("n1", record("f1", "hash-new", 200));
        let catalog = Arc::new(MemCatalog::default());
        let mut stale = entry_stub("f1");
        stale.course_ids = vec!["course-7".to_string()];
        stale.read_only_user_ids = vec!["user-3".to_string()];
        catalog.entries.insert("f1".to_string(), stale);

        let engine = ConsistencyEngine::new(storage, catalog.clone());
        engine.run_cycle(&nodes(&["n1", "n2"])).await.unwrap();

        let entry = catalog.entry("f1").unwrap();
        assert_eq!(entry.content_hash, "hash-new");
        assert_eq!(entry.course_ids, vec!["course-7".to_string()]);
        assert_eq!(entry.read_only_user_ids, vec!["user-3".to_string()]);
    }

    // ============================================================
    // AUTHORITATIVE RESOLUTION
    // ============================================================

    #[test]
    fn test_newest_timestamp_wins() {
        let mut index = ReplicaIndex::new();
        index.insert("f1", replica("n1", "hash-a", 100));
        index.insert("f1", replica("n2", "hash-b", 300));
        index.insert("f1", replica("n3", "hash-c", 200));

        let winners = resolve_authoritative(&index);
        assert_eq!(winners["f1"].node_addr, "n2");
        assert_eq!(winners["f1"].content_hash, "hash-b");
    }

    #[test]
    fn test_timestamp_tie_keeps_first_seen() {
        let mut index = ReplicaIndex::new();
        index.insert("f1", replica("n1", "hash-a", 100));
        index.insert("f1", replica("n2", "hash-b", 100));

        let winners = resolve_authoritative(&index);
        assert_eq!(winners["f1"].node_addr, "n1");
    }

    fn replica(addr: &str, hash: &str, ts: u64) -> ReplicaMeta {
        ReplicaMeta {
            node_addr: addr.to_string(),
            file_name: "f1.txt".to_string(),
            content_hash: hash.to_string(),
            last_updated: ts,
            owner_id: "owner-1".to_string(),
        }
    }

    #[test]
    fn test_desired_replica_count_scale() {
        assert_eq!(desired_replica_count(1), 1);
        assert_eq!(desired_replica_count(2), 1);
        assert_eq!(desired_replica_count(3), 2);
        assert_eq!(desired_replica_count(4), 2);
        assert_eq!(desired_replica_count(6), 3);
        assert_eq!(desired_replica_count(9), 4);
    }
}
