//! Read-only, point-in-time view of a ref database.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use geovc_types::ObjectId;
use tracing::{debug, warn};

use crate::error::{RefError, RefResult};
use crate::traits::RefDatabase;
use crate::types::Ref;

/// A consistent view of another [`RefDatabase`] for the length of one
/// logical operation.
///
/// The first read copies every ref from the backing database; later reads
/// are answered from that copy even while the backing database changes.
/// [`close`](RefDatabase::close) drops the copy, so the next read takes a
/// fresh one. Every mutation fails with [`RefError::ReadOnlySnapshot`].
pub struct SnapshotRefDatabase<D> {
    inner: D,
    view: Mutex<Option<Arc<BTreeMap<String, Ref>>>>,
}

impl<D: RefDatabase> SnapshotRefDatabase<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            view: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// `true` once the view has been taken and until it is closed.
    pub fn is_cached(&self) -> RefResult<bool> {
        Ok(self.lock()?.is_some())
    }

    fn lock(&self) -> RefResult<std::sync::MutexGuard<'_, Option<Arc<BTreeMap<String, Ref>>>>> {
        self.view
            .lock()
            .map_err(|e| RefError::LockPoisoned(e.to_string()))
    }

    fn view(&self) -> RefResult<Arc<BTreeMap<String, Ref>>> {
        let mut view = self.lock()?;
        if let Some(cached) = view.as_ref() {
            return Ok(Arc::clone(cached));
        }
        let refs = Arc::new(self.inner.get_all("")?);
        debug!(refs = refs.len(), "took ref snapshot");
        *view = Some(Arc::clone(&refs));
        Ok(refs)
    }

    fn reject(&self, operation: &'static str, name: &str) -> RefError {
        warn!(operation, name, "rejected write to ref snapshot");
        RefError::ReadOnlySnapshot { operation }
    }
}

impl<D: RefDatabase> RefDatabase for SnapshotRefDatabase<D> {
    fn get(&self, name: &str) -> RefResult<Option<Ref>> {
        Ok(self.view()?.get(name).cloned())
    }

    fn put_ref(&self, name: &str, _target: ObjectId) -> RefResult<()> {
        Err(self.reject("put_ref", name))
    }

    fn put_sym_ref(&self, name: &str, _target: &str) -> RefResult<()> {
        Err(self.reject("put_sym_ref", name))
    }

    fn remove(&self, name: &str) -> RefResult<Option<Ref>> {
        Err(self.reject("remove", name))
    }

    fn get_all(&self, prefix: &str) -> RefResult<BTreeMap<String, Ref>> {
        Ok(self
            .view()?
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, r)| (name.clone(), r.clone()))
            .collect())
    }

    fn close(&self) -> RefResult<()> {
        if self.lock()?.take().is_some() {
            debug!("released ref snapshot");
        }
        Ok(())
    }
}
