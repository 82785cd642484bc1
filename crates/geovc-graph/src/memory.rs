//! In-memory commit graph.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use geovc_types::ObjectId;
use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::traits::GraphDatabase;

#[derive(Debug, Default)]
struct GraphState {
    /// Recorded commits and their parents.
    parents: HashMap<ObjectId, Vec<ObjectId>>,
    /// Forward-edge index: parent -> children.
    children: HashMap<ObjectId, Vec<ObjectId>>,
}

/// [`GraphDatabase`] held in two `HashMap`s behind a `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryGraphDatabase {
    state: RwLock<GraphState>,
}

impl InMemoryGraphDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> GraphResult<RwLockReadGuard<'_, GraphState>> {
        self.state
            .read()
            .map_err(|e| GraphError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> GraphResult<RwLockWriteGuard<'_, GraphState>> {
        self.state
            .write()
            .map_err(|e| GraphError::LockPoisoned(e.to_string()))
    }
}

impl GraphDatabase for InMemoryGraphDatabase {
    fn exists(&self, commit: &ObjectId) -> GraphResult<bool> {
        Ok(self.read()?.parents.contains_key(commit))
    }

    fn put(&self, commit: &ObjectId, parents: &[ObjectId]) -> GraphResult<bool> {
        if parents.contains(commit) {
            return Err(GraphError::SelfParent(*commit));
        }
        let mut state = self.write()?;
        if let Some(existing) = state.parents.get(commit) {
            if existing.as_slice() != parents {
                return Err(GraphError::ConflictingParents(*commit));
            }
            return Ok(false);
        }
        for parent in parents {
            let children = state.children.entry(*parent).or_default();
            if !children.contains(commit) {
                children.push(*commit);
            }
        }
        state.parents.insert(*commit, parents.to_vec());
        debug!(
            commit = %commit.short_hex(),
            parents = parents.len(),
            "recorded commit in graph"
        );
        Ok(true)
    }

    fn remove(&self, commit: &ObjectId) -> GraphResult<bool> {
        let mut state = self.write()?;
        let Some(parents) = state.parents.remove(commit) else {
            return Ok(false);
        };
        for parent in parents {
            if let Some(children) = state.children.get_mut(&parent) {
                children.retain(|c| c != commit);
                if children.is_empty() {
                    state.children.remove(&parent);
                }
            }
        }
        debug!(commit = %commit.short_hex(), "removed commit from graph");
        Ok(true)
    }

    fn parents(&self, commit: &ObjectId) -> GraphResult<Vec<ObjectId>> {
        Ok(self
            .read()?
            .parents
            .get(commit)
            .cloned()
            .unwrap_or_default())
    }

    fn children(&self, commit: &ObjectId) -> GraphResult<Vec<ObjectId>> {
        Ok(self
            .read()?
            .children
            .get(commit)
            .cloned()
            .unwrap_or_default())
    }

    fn len(&self) -> GraphResult<usize> {
        Ok(self.read()?.parents.len())
    }
}
