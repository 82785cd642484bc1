//! Object store wrapper that keeps a commit graph in step with its commits.

use std::sync::Mutex;

use geovc_store::{ObjectStore, RevObject, StoreError, StoreResult};
use geovc_types::ObjectId;
use tracing::{debug, warn};

use crate::traits::GraphDatabase;

/// An [`ObjectStore`] that records every commit it stores in a
/// [`GraphDatabase`].
///
/// Storing a commit and recording it in the graph happen under one lock. If
/// the graph update fails, a commit inserted by the same call is deleted
/// again, so the store never holds a commit the graph does not know about.
/// Non-commit objects pass straight through.
pub struct GraphIndexedStore<S, G> {
    store: S,
    graph: G,
    commit_lock: Mutex<()>,
}

impl<S: ObjectStore, G: GraphDatabase> GraphIndexedStore<S, G> {
    pub fn new(store: S, graph: G) -> Self {
        Self {
            store,
            graph,
            commit_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn into_parts(self) -> (S, G) {
        (self.store, self.graph)
    }

    fn put_commit(&self, object: &RevObject, parents: &[ObjectId]) -> StoreResult<bool> {
        let _guard = self
            .commit_lock
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        let id = object.id();
        let inserted = self.store.put(object)?;
        if let Err(e) = self.graph.put(&id, parents) {
            warn!(commit = %id.short_hex(), error = %e, "graph update failed");
            if inserted {
                self.store.delete(&id)?;
                debug!(commit = %id.short_hex(), "rolled back commit insert");
            }
            return Err(StoreError::Index(e.to_string()));
        }
        Ok(inserted)
    }
}

impl<S: ObjectStore, G: GraphDatabase> ObjectStore for GraphIndexedStore<S, G> {
    fn open(&self) -> StoreResult<()> {
        self.store.open()
    }

    fn close(&self) -> StoreResult<()> {
        self.store.close()
    }

    fn is_open(&self) -> bool {
        self.store.is_open()
    }

    fn is_read_only(&self) -> bool {
        self.store.is_read_only()
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        self.store.exists(id)
    }

    fn get_if_present(&self, id: &ObjectId) -> StoreResult<Option<RevObject>> {
        self.store.get_if_present(id)
    }

    fn put(&self, object: &RevObject) -> StoreResult<bool> {
        match object {
            RevObject::Commit(commit) => self.put_commit(object, commit.parents()),
            _ => self.store.put(object),
        }
    }

    fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
        let _guard = self
            .commit_lock
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        let deleted = self.store.delete(id)?;
        if deleted {
            self.graph
                .remove(id)
                .map_err(|e| StoreError::Index(e.to_string()))?;
        }
        Ok(deleted)
    }

    fn lookup(&self, partial: &str) -> StoreResult<Vec<ObjectId>> {
        self.store.lookup(partial)
    }
}
