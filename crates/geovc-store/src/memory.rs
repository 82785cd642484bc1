use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use geovc_types::ObjectId;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::object::{empty_tree_id, RevObject, RevTree};
use crate::traits::{normalize_partial_id, ObjectStore};

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. Objects live behind a `RwLock`; trees
/// share their entry data, other objects are cloned on read. A new store is
/// already open.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ObjectId, RevObject>>,
    open: AtomicBool,
    read_only: bool,
}

impl InMemoryObjectStore {
    /// Create a new empty, writable store.
    pub fn new() -> Self {
        Self::with_config(&StoreConfig::default())
    }

    pub fn with_config(config: &StoreConfig) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            open: AtomicBool::new(true),
            read_only: config.read_only,
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read_map()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.read_map()?.is_empty())
    }

    /// All stored ids, sorted.
    pub fn all_ids(&self) -> StoreResult<Vec<ObjectId>> {
        let mut ids: Vec<ObjectId> = self.read_map()?.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    fn check_open(&self) -> StoreResult<()> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Closed)
        }
    }

    fn check_writable(&self) -> StoreResult<()> {
        self.check_open()?;
        if self.read_only {
            warn!("rejected write to read-only store");
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }

    fn read_map(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<ObjectId, RevObject>>> {
        self.objects
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write_map(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<ObjectId, RevObject>>> {
        self.objects
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn open(&self) -> StoreResult<()> {
        self.open.store(true, Ordering::Release);
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        self.open.store(false, Ordering::Release);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        self.check_open()?;
        Ok(*id == empty_tree_id() || self.read_map()?.contains_key(id))
    }

    fn get_if_present(&self, id: &ObjectId) -> StoreResult<Option<RevObject>> {
        self.check_open()?;
        if let Some(object) = self.read_map()?.get(id) {
            return Ok(Some(object.clone()));
        }
        if *id == empty_tree_id() {
            return Ok(Some(RevObject::Tree(RevTree::empty())));
        }
        Ok(None)
    }

    fn put(&self, object: &RevObject) -> StoreResult<bool> {
        self.check_writable()?;
        let id = object.id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let mut map = self.write_map()?;
        if map.contains_key(&id) {
            return Ok(false);
        }
        map.insert(id, object.clone());
        debug!(id = %id.short_hex(), kind = %object.object_type(), "stored object");
        Ok(true)
    }

    fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
        self.check_writable()?;
        Ok(self.write_map()?.remove(id).is_some())
    }

    fn lookup(&self, partial: &str) -> StoreResult<Vec<ObjectId>> {
        let prefix = normalize_partial_id(partial)?;
        self.check_open()?;
        let mut ids: Vec<ObjectId> = self
            .read_map()?
            .keys()
            .filter(|id| id.has_prefix(&prefix))
            .copied()
            .collect();
        ids.sort();
        Ok(ids)
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len().unwrap_or_default())
            .field("open", &self.is_open())
            .field("read_only", &self.read_only)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use super::*;
    use crate::object::{Node, Person, RevCommit, RevFeature, RevObjectType};
    use crate::traits::CountingListener;
    use geovc_types::FieldValue;

    fn feature(n: i64) -> RevObject {
        RevFeature::new(vec![FieldValue::Long(n)]).into()
    }

    fn commit() -> RevObject {
        let who = Person::new("a", "a@b.c", 0);
        RevCommit::new(empty_tree_id(), vec![], who.clone(), who, "init").into()
    }

    // -----------------------------------------------------------------------
    // Core operations
    // -----------------------------------------------------------------------

    #[test]
    fn put_get_exists() {
        let store = InMemoryObjectStore::new();
        let obj = feature(1);
        assert!(store.put(&obj).unwrap());
        assert!(store.exists(&obj.id()).unwrap());
        assert_eq!(store.get(&obj.id()).unwrap(), obj);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn put_is_idempotent() {
        let store = InMemoryObjectStore::new();
        let obj = feature(1);
        assert!(store.put(&obj).unwrap());
        assert!(!store.put(&obj).unwrap());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn get_missing_fails_but_get_if_present_is_none() {
        let store = InMemoryObjectStore::new();
        let id = ObjectId::from_raw([7; 20]);
        assert!(matches!(store.get(&id), Err(StoreError::NotFound(x)) if x == id));
        assert!(store.get_if_present(&id).unwrap().is_none());
        assert!(store
            .get_if_present_typed(&id, RevObjectType::Tree)
            .unwrap()
            .is_none());
    }

    #[test]
    fn typed_get_rejects_wrong_type() {
        let store = InMemoryObjectStore::new();
        let obj = feature(1);
        store.put(&obj).unwrap();
        assert!(store.get_feature(&obj.id()).is_ok());
        assert!(matches!(
            store.get_tree(&obj.id()),
            Err(StoreError::WrongType { .. })
        ));
        assert!(store
            .get_if_present_typed(&obj.id(), RevObjectType::Commit)
            .is_err());
    }

    #[test]
    fn empty_tree_always_resolves() {
        let store = InMemoryObjectStore::new();
        assert!(store.exists(&empty_tree_id()).unwrap());
        let tree = store.get_tree(&empty_tree_id()).unwrap();
        assert!(tree.is_empty());
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn delete_present_and_missing() {
        let store = InMemoryObjectStore::new();
        let obj = commit();
        store.put(&obj).unwrap();
        assert!(store.get_commit(&obj.id()).is_ok());
        assert!(store.delete(&obj.id()).unwrap());
        assert!(!store.delete(&obj.id()).unwrap());
        assert!(!store.exists(&obj.id()).unwrap());
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    #[test]
    fn lookup_by_prefix() {
        let store = InMemoryObjectStore::new();
        let obj = feature(42);
        store.put(&obj).unwrap();
        store.put(&feature(43)).unwrap();
        let hex = obj.id().to_hex();
        assert_eq!(store.lookup(&hex[..8]).unwrap(), vec![obj.id()]);
        assert_eq!(store.lookup(&hex.to_uppercase()).unwrap(), vec![obj.id()]);
        assert!(matches!(
            store.lookup(&hex[..7]),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Lifecycle and modes
    // -----------------------------------------------------------------------

    #[test]
    fn closed_store_rejects_everything() {
        let store = InMemoryObjectStore::new();
        let obj = feature(1);
        store.put(&obj).unwrap();
        store.close().unwrap();
        assert!(!store.is_open());
        assert!(matches!(store.put(&feature(2)), Err(StoreError::Closed)));
        assert!(matches!(store.get(&obj.id()), Err(StoreError::Closed)));
        assert!(matches!(store.exists(&obj.id()), Err(StoreError::Closed)));
        store.open().unwrap();
        assert!(store.exists(&obj.id()).unwrap());
    }

    #[test]
    fn read_only_rejects_writes() {
        let store = InMemoryObjectStore::with_config(&StoreConfig {
            read_only: true,
            ..Default::default()
        });
        assert!(store.is_read_only());
        assert!(matches!(store.put(&feature(1)), Err(StoreError::ReadOnly)));
        assert!(matches!(
            store.delete(&ObjectId::NULL),
            Err(StoreError::ReadOnly)
        ));
        assert!(store.get_if_present(&ObjectId::NULL).unwrap().is_none());
    }

    // -----------------------------------------------------------------------
    // Bulk operations
    // -----------------------------------------------------------------------

    #[test]
    fn bulk_ops_report_per_item() {
        let store = InMemoryObjectStore::new();
        let objs = vec![feature(1), feature(2), feature(3)];
        store.put(&objs[0]).unwrap();

        let listener = CountingListener::new();
        assert_eq!(store.put_all(&objs, &listener).unwrap(), 2);
        assert_eq!(listener.inserted_count(), 2);

        let missing = ObjectId::from_raw([9; 20]);
        let ids = vec![objs[0].id(), missing, objs[2].id()];
        let got = store.get_all(&ids, &listener).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(listener.found_count(), 2);
        assert_eq!(listener.not_found_count(), 1);

        assert_eq!(store.delete_all(&ids, &listener).unwrap(), 2);
        assert_eq!(listener.deleted_count(), 2);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn tree_round_trips_through_store() {
        let store = InMemoryObjectStore::new();
        let tree =
            RevTree::from_features(vec![Node::feature("f", ObjectId::from_raw([1; 20]))]).unwrap();
        store.put(&tree.clone().into()).unwrap();
        assert_eq!(store.get_tree(&tree.id()).unwrap(), tree);
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_put_has_single_winner() {
        const THREADS: usize = 16;
        let store = Arc::new(InMemoryObjectStore::new());
        let barrier = Arc::new(Barrier::new(THREADS));
        let obj = feature(1234);

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                let obj = obj.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let inserted = store.put(&obj).unwrap();
                    assert!(store.exists(&obj.id()).unwrap());
                    inserted
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|inserted| *inserted)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(store.get(&obj.id()).unwrap(), obj);
    }
}
