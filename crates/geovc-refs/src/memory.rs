//! In-memory ref database for testing and ephemeral use.
//!
//! [`InMemoryRefDatabase`] stores all refs in a `BTreeMap` protected by a
//! `RwLock`, so prefix listings come out in name order.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use geovc_types::ObjectId;
use tracing::debug;

use crate::error::{RefError, RefResult};
use crate::names::validate_ref_name;
use crate::traits::RefDatabase;
use crate::types::Ref;

/// An in-memory implementation of [`RefDatabase`].
///
/// Data is lost when the database is dropped.
#[derive(Debug, Default)]
pub struct InMemoryRefDatabase {
    refs: RwLock<BTreeMap<String, Ref>>,
}

impl InMemoryRefDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RefResult<RwLockReadGuard<'_, BTreeMap<String, Ref>>> {
        self.refs
            .read()
            .map_err(|e| RefError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> RefResult<RwLockWriteGuard<'_, BTreeMap<String, Ref>>> {
        self.refs
            .write()
            .map_err(|e| RefError::LockPoisoned(e.to_string()))
    }

    fn insert(&self, reference: Ref) -> RefResult<()> {
        validate_ref_name(reference.name())?;
        debug!(reference = %reference, "updating ref");
        self.write()?
            .insert(reference.name().to_string(), reference);
        Ok(())
    }
}

impl RefDatabase for InMemoryRefDatabase {
    fn get(&self, name: &str) -> RefResult<Option<Ref>> {
        Ok(self.read()?.get(name).cloned())
    }

    fn put_ref(&self, name: &str, target: ObjectId) -> RefResult<()> {
        self.insert(Ref::direct(name, target))
    }

    fn put_sym_ref(&self, name: &str, target: &str) -> RefResult<()> {
        validate_ref_name(target)?;
        self.insert(Ref::symbolic(name, target))
    }

    fn remove(&self, name: &str) -> RefResult<Option<Ref>> {
        let removed = self.write()?.remove(name);
        if removed.is_some() {
            debug!(name, "removed ref");
        }
        Ok(removed)
    }

    fn get_all(&self, prefix: &str) -> RefResult<BTreeMap<String, Ref>> {
        Ok(self
            .read()?
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(name, r)| (name.clone(), r.clone()))
            .collect())
    }
}
