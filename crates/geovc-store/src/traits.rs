use std::sync::atomic::{AtomicUsize, Ordering};

use geovc_types::ObjectId;
use tracing::warn;

use crate::error::{StoreError, StoreResult};
use crate::object::{RevCommit, RevFeature, RevFeatureType, RevObject, RevObjectType, RevTag, RevTree};

/// Shortest hex prefix accepted by [`ObjectStore::lookup`].
pub const MIN_PARTIAL_ID_LEN: usize = 8;

/// Per-item progress events emitted by bulk store operations.
///
/// Listeners may be called from whatever thread the backend uses to process
/// the batch.
pub trait BulkOpListener: Send + Sync {
    fn found(&self, _object: &RevObject) {}
    fn not_found(&self, _id: &ObjectId) {}
    fn inserted(&self, _object: &RevObject) {}
    fn deleted(&self, _id: &ObjectId) {}
}

/// Listener that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl BulkOpListener for NoopListener {}

/// Listener that counts events.
#[derive(Debug, Default)]
pub struct CountingListener {
    found: AtomicUsize,
    not_found: AtomicUsize,
    inserted: AtomicUsize,
    deleted: AtomicUsize,
}

impl CountingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn found_count(&self) -> usize {
        self.found.load(Ordering::Relaxed)
    }

    pub fn not_found_count(&self) -> usize {
        self.not_found.load(Ordering::Relaxed)
    }

    pub fn inserted_count(&self) -> usize {
        self.inserted.load(Ordering::Relaxed)
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted.load(Ordering::Relaxed)
    }
}

impl BulkOpListener for CountingListener {
    fn found(&self, _object: &RevObject) {
        self.found.fetch_add(1, Ordering::Relaxed);
    }

    fn not_found(&self, _id: &ObjectId) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    fn inserted(&self, _object: &RevObject) {
        self.inserted.fetch_add(1, Ordering::Relaxed);
    }

    fn deleted(&self, _id: &ObjectId) {
        self.deleted.fetch_add(1, Ordering::Relaxed);
    }
}

/// Validate an abbreviated id and return it lowercased.
///
/// Accepts 8 to 40 hex characters; anything else is rejected with
/// [`StoreError::InvalidArgument`].
pub fn normalize_partial_id(partial: &str) -> StoreResult<String> {
    if partial.len() < MIN_PARTIAL_ID_LEN || partial.len() > 40 {
        return Err(StoreError::InvalidArgument(format!(
            "partial id must have {MIN_PARTIAL_ID_LEN} to 40 hex characters, got {}",
            partial.len()
        )));
    }
    if !partial.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(StoreError::InvalidArgument(format!(
            "partial id {partial:?} is not hexadecimal"
        )));
    }
    Ok(partial.to_ascii_lowercase())
}

/// Content-addressed revision object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable. Storing an id that is already present is a
///   no-op, never an overwrite.
/// - `put` is safe under concurrent calls with the same object: exactly one
///   caller sees `true`, and every caller may assume the object is stored
///   once its call returns.
/// - The empty tree ([`crate::object::empty_tree_id`]) is always resolvable,
///   whether or not it was stored.
/// - Every operation on a closed store fails with [`StoreError::Closed`];
///   writes to a read-only store fail with [`StoreError::ReadOnly`].
/// - Bulk operations process every item even when some fail, and report the
///   first failure once the batch is done.
pub trait ObjectStore: Send + Sync {
    fn open(&self) -> StoreResult<()>;

    fn close(&self) -> StoreResult<()>;

    fn is_open(&self) -> bool;

    fn is_read_only(&self) -> bool;

    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Read an object, returning `Ok(None)` if it does not exist.
    fn get_if_present(&self, id: &ObjectId) -> StoreResult<Option<RevObject>>;

    /// Store an object. Returns `true` if this call inserted it.
    fn put(&self, object: &RevObject) -> StoreResult<bool>;

    /// Remove an object. Returns `true` if it existed.
    fn delete(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Ids whose hex form starts with `partial` (at least 8 hex characters).
    fn lookup(&self, partial: &str) -> StoreResult<Vec<ObjectId>>;

    /// Read an object, failing with [`StoreError::NotFound`] if it is absent.
    fn get(&self, id: &ObjectId) -> StoreResult<RevObject> {
        self.get_if_present(id)?
            .ok_or(StoreError::NotFound(*id))
    }

    fn get_typed(&self, id: &ObjectId, expected: RevObjectType) -> StoreResult<RevObject> {
        self.get(id)?.expect_type(expected)
    }

    /// Like [`get_typed`](Self::get_typed) but absence is `Ok(None)`. An
    /// object of another type is still an error.
    fn get_if_present_typed(
        &self,
        id: &ObjectId,
        expected: RevObjectType,
    ) -> StoreResult<Option<RevObject>> {
        self.get_if_present(id)?
            .map(|o| o.expect_type(expected))
            .transpose()
    }

    fn get_tree(&self, id: &ObjectId) -> StoreResult<RevTree> {
        self.get(id)?.into_tree()
    }

    fn get_commit(&self, id: &ObjectId) -> StoreResult<RevCommit> {
        self.get(id)?.into_commit()
    }

    fn get_feature(&self, id: &ObjectId) -> StoreResult<RevFeature> {
        self.get(id)?.into_feature()
    }

    fn get_feature_type(&self, id: &ObjectId) -> StoreResult<RevFeatureType> {
        self.get(id)?.into_feature_type()
    }

    fn get_tag(&self, id: &ObjectId) -> StoreResult<RevTag> {
        self.get(id)?.into_tag()
    }

    /// Read many objects. Missing ids are reported to `listener` and skipped.
    fn get_all(
        &self,
        ids: &[ObjectId],
        listener: &dyn BulkOpListener,
    ) -> StoreResult<Vec<RevObject>> {
        let mut found = Vec::with_capacity(ids.len());
        let mut first_err = None;
        for id in ids {
            match self.get_if_present(id) {
                Ok(Some(object)) => {
                    listener.found(&object);
                    found.push(object);
                }
                Ok(None) => listener.not_found(id),
                Err(e) => {
                    warn!(id = %id.short_hex(), error = %e, "bulk get failed");
                    first_err.get_or_insert(e);
                }
            }
        }
        first_err.map_or(Ok(found), Err)
    }

    /// Store many objects. Returns how many were newly inserted.
    fn put_all(&self, objects: &[RevObject], listener: &dyn BulkOpListener) -> StoreResult<usize> {
        let mut inserted = 0;
        let mut first_err = None;
        for object in objects {
            match self.put(object) {
                Ok(true) => {
                    inserted += 1;
                    listener.inserted(object);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(id = %object.id().short_hex(), error = %e, "bulk put failed");
                    first_err.get_or_insert(e);
                }
            }
        }
        first_err.map_or(Ok(inserted), Err)
    }

    /// Delete many objects. Returns how many existed.
    fn delete_all(&self, ids: &[ObjectId], listener: &dyn BulkOpListener) -> StoreResult<usize> {
        let mut deleted = 0;
        let mut first_err = None;
        for id in ids {
            match self.delete(id) {
                Ok(true) => {
                    deleted += 1;
                    listener.deleted(id);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(id = %id.short_hex(), error = %e, "bulk delete failed");
                    first_err.get_or_insert(e);
                }
            }
        }
        first_err.map_or(Ok(deleted), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_id_length_bounds() {
        assert!(normalize_partial_id("abcdef0").is_err());
        assert_eq!(normalize_partial_id("ABCDEF01").unwrap(), "abcdef01");
        assert!(normalize_partial_id(&"a".repeat(41)).is_err());
        assert!(normalize_partial_id("abcdefgh").is_err());
    }

    #[test]
    fn counting_listener_counts() {
        let l = CountingListener::new();
        l.not_found(&ObjectId::NULL);
        l.deleted(&ObjectId::NULL);
        l.deleted(&ObjectId::NULL);
        assert_eq!(l.not_found_count(), 1);
        assert_eq!(l.deleted_count(), 2);
        assert_eq!(l.found_count(), 0);
        assert_eq!(l.inserted_count(), 0);
    }
}
