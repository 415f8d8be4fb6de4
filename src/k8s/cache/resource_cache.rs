use super::change::{ChangeDetection, ContentEq};
use kube::{Resource, ResourceExt};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// Name-keyed mirror of a remote collection.
///
/// Only the watch session writes; everything else reads snapshots.
#[derive(Debug)]
pub struct ResourceCache<K> {
    entries: RwLock<HashMap<String, K>>,
    upserts: AtomicU64,
    unchanged_upserts: AtomicU64,
    removals: AtomicU64,
}

impl<K> Default for ResourceCache<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> ResourceCache<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            upserts: AtomicU64::new(0),
            unchanged_upserts: AtomicU64::new(0),
            removals: AtomicU64::new(0),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Removes the entry stored under `name`
    pub async fn remove(&self, name: &str) -> Option<K> {
        let removed = self.entries.write().await.remove(name);
        if removed.is_some() {
            self.removals.fetch_add(1, Ordering::Relaxed);
            debug!("🗑️  Cache REMOVE: {}", name);
        }
        removed
    }

    /// Drops every entry whose name is not in `names`, returning what was dropped
    pub async fn retain_names(&self, names: &HashSet<String>) -> Vec<K> {
        let mut entries = self.entries.write().await;
        let stale: Vec<String> = entries
            .keys()
            .filter(|name| !names.contains(*name))
            .cloned()
            .collect();

        let removed: Vec<K> = stale.iter().filter_map(|name| entries.remove(name)).collect();
        drop(entries);

        self.removals.fetch_add(removed.len() as u64, Ordering::Relaxed);
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            upserts: self.upserts.load(Ordering::Relaxed),
            unchanged_upserts: self.unchanged_upserts.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
        }
    }
}

impl<K> ResourceCache<K>
where
    K: Resource + ContentEq + Serialize + Clone,
{
    /// Stores `resource` under its name and reports whether its content changed.
    ///
    /// The new representation is stored even when the content is unchanged so that any
    /// non-semantic metadata is refreshed. Comparison and store happen under one write lock.
    pub async fn upsert(&self, resource: K, detection: ChangeDetection) -> bool {
        let name = resource.name_any();
        let mut entries = self.entries.write().await;

        let changed = detection.is_change(entries.get(&name), &resource);
        entries.insert(name, resource);
        drop(entries);

        self.upserts.fetch_add(1, Ordering::Relaxed);
        if !changed {
            self.unchanged_upserts.fetch_add(1, Ordering::Relaxed);
        }
        changed
    }

    pub async fn get(&self, name: &str) -> Option<K> {
        self.entries.read().await.get(name).cloned()
    }

    /// Copy of every cached resource, in no particular order
    pub async fn list(&self) -> Vec<K> {
        self.entries.read().await.values().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub upserts: u64,
    pub unchanged_upserts: u64,
    pub removals: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn cm(name: &str, value: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            data: Some(BTreeMap::from([("value".to_string(), value.to_string())])),
            ..ConfigMap::default()
        }
    }

    #[tokio::test]
    async fn test_cache_basic_operations() {
        let cache = ResourceCache::new();
        assert!(cache.is_empty().await);

        assert!(cache.upsert(cm("cm1", "a"), ChangeDetection::Structural).await);
        assert_eq!(cache.get("cm1").await, Some(cm("cm1", "a")));
        assert_eq!(cache.len().await, 1);

        assert_eq!(cache.remove("cm1").await, Some(cm("cm1", "a")));
        assert!(cache.get("cm1").await.is_none());
        assert!(cache.remove("cm1").await.is_none());
        assert_eq!(cache.stats().removals, 1);
    }

    #[tokio::test]
    async fn test_unchanged_upsert_still_stores() {
        let cache = ResourceCache::new();
        let mut first = cm("cm1", "a");
        first.metadata.annotations = Some(BTreeMap::from([("note".to_string(), "x".to_string())]));
        cache.upsert(first, ChangeDetection::Structural).await;

        assert!(cache.upsert(cm("cm1", "b"), ChangeDetection::Structural).await);
        assert!(!cache.upsert(cm("cm1", "b"), ChangeDetection::Structural).await);
        assert_eq!(cache.get("cm1").await, Some(cm("cm1", "b")));

        let stats = cache.stats();
        assert_eq!(stats.upserts, 3);
        assert_eq!(stats.unchanged_upserts, 1);
    }

    #[tokio::test]
    async fn test_retain_names() {
        let cache = ResourceCache::new();
        for name in ["cm1", "cm2", "cm3"] {
            cache.upsert(cm(name, "v"), ChangeDetection::Structural).await;
        }

        let keep = HashSet::from(["cm2".to_string()]);
        let mut removed: Vec<String> = cache
            .retain_names(&keep)
            .await
            .iter()
            .map(ResourceExt::name_any)
            .collect();
        removed.sort();

        assert_eq!(removed, vec!["cm1".to_string(), "cm3".to_string()]);
        assert_eq!(cache.list().await, vec![cm("cm2", "v")]);
    }

    #[tokio::test]
    async fn test_event_sequences_fold_to_last_writer() {
        enum Op {
            Put(&'static str, &'static str),
            Del(&'static str),
        }
        let sequences = vec![
            vec![Op::Put("a", "1"), Op::Put("b", "1"), Op::Put("a", "2")],
            vec![Op::Put("a", "1"), Op::Del("a"), Op::Put("a", "3")],
            vec![Op::Del("x"), Op::Put("y", "1"), Op::Del("y")],
            vec![Op::Put("a", "1"), Op::Put("a", "1"), Op::Put("b", "2"), Op::Del("a")],
        ];

        for ops in sequences {
            let cache = ResourceCache::new();
            let mut expected = BTreeMap::new();
            for op in ops {
                match op {
                    Op::Put(name, value) => {
                        cache.upsert(cm(name, value), ChangeDetection::Structural).await;
                        expected.insert(name.to_string(), cm(name, value));
                    }
                    Op::Del(name) => {
                        cache.remove(name).await;
                        expected.remove(name);
                    }
                }
            }

            let actual: BTreeMap<String, ConfigMap> = cache
                .list()
                .await
                .into_iter()
                .map(|c| (c.name_any(), c))
                .collect();
            assert_eq!(actual, expected);
        }
    }
}
