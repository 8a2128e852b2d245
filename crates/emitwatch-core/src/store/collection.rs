// ── Generic reactive entity collection ──
//
// Concurrent keyed storage with push-based change notification via
// `watch` channels.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

/// A concurrent, reactive collection for a single entity type.
///
/// Uses `DashMap` for O(1) lookups and `watch` channels for push-based
/// change notification. Every mutation bumps a version counter and
/// rebuilds the snapshot that subscribers receive. Snapshots are ordered
/// by key so renderers get a stable row order.
pub(crate) struct EntityCollection<T: Send + Sync + 'static> {
    by_key: DashMap<String, Arc<T>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation for cheap subscription.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Send + Sync + 'static> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_key: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or overwrite an entity. Returns `true` if the key was new.
    pub(crate) fn upsert(&self, key: String, entity: T) -> bool {
        let is_new = self.by_key.insert(key, Arc::new(entity)).is_none();
        self.publish();
        is_new
    }

    /// Discard everything and load `entries` instead.
    ///
    /// Subscribers see one snapshot for the whole replacement.
    pub(crate) fn replace_all(&self, entries: impl IntoIterator<Item = (String, T)>) {
        self.by_key.clear();
        for (key, entity) in entries {
            self.by_key.insert(key, Arc::new(entity));
        }
        self.publish();
    }

    /// Remove an entity by key. Returns the removed entity if it existed.
    pub(crate) fn remove(&self, key: &str) -> Option<Arc<T>> {
        let removed = self.by_key.remove(key).map(|(_, v)| v);
        if removed.is_some() {
            self.publish();
        }
        removed
    }

    pub(crate) fn get(&self, key: &str) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn publish(&self) {
        self.rebuild_snapshot();
        self.bump_version();
    }

    /// Collect all values into a key-ordered snapshot and broadcast it.
    fn rebuild_snapshot(&self) {
        let mut entries: Vec<(String, Arc<T>)> = self
            .by_key
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let values = entries.into_iter().map(|(_, v)| v).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn upsert_reports_new_keys() {
        let col: EntityCollection<String> = EntityCollection::new();
        assert!(col.upsert("key1".into(), "hello".into()));
        assert!(!col.upsert("key1".into(), "world".into()));
        assert_eq!(*col.get("key1").unwrap(), "world");
        assert_eq!(col.len(), 1);
    }

    #[test]
    fn remove_publishes_only_when_present() {
        let col: EntityCollection<String> = EntityCollection::new();
        col.upsert("key1".into(), "hello".into());
        let before = col.version();

        assert!(col.remove("missing").is_none());
        assert_eq!(col.version(), before);

        assert_eq!(*col.remove("key1").unwrap(), "hello");
        assert_eq!(col.version(), before + 1);
        assert!(col.snapshot().is_empty());
    }

    #[test]
    fn replace_all_publishes_once() {
        let col: EntityCollection<String> = EntityCollection::new();
        col.upsert("stale".into(), "x".into());
        let mut rx = col.subscribe();
        assert!(!rx.has_changed().unwrap());
        let before = col.version();

        col.replace_all([("b".to_string(), "2".to_string()), ("a".into(), "1".into())]);

        assert_eq!(col.version(), before + 1);
        assert!(rx.has_changed().unwrap());
        let snap = rx.borrow_and_update().clone();
        let values: Vec<&str> = snap.iter().map(|v| v.as_str()).collect();
        assert_eq!(values, vec!["1", "2"]);
        assert!(col.get("stale").is_none());
    }

    #[test]
    fn snapshot_is_ordered_by_key() {
        let col: EntityCollection<String> = EntityCollection::new();
        col.upsert("c".into(), "3".into());
        col.upsert("a".into(), "1".into());
        col.upsert("b".into(), "2".into());

        let snap = col.snapshot();
        let values: Vec<&str> = snap.iter().map(|v| v.as_str()).collect();
        assert_eq!(values, vec!["1", "2", "3"]);
    }
}
