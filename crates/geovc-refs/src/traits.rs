//! The [`RefDatabase`] trait defining the reference storage interface.

use std::collections::BTreeMap;
use std::sync::Arc;

use geovc_types::ObjectId;

use crate::error::{RefError, RefResult};
use crate::types::Ref;

/// Longest chain of symbolic refs [`RefDatabase::resolve`] follows.
pub const MAX_SYMBOLIC_DEPTH: usize = 8;

/// Storage backend for named references.
///
/// Implementations must be thread-safe (`Send + Sync`). Names are full ref
/// names (`refs/heads/master`, `HEAD`) and are validated on write.
pub trait RefDatabase: Send + Sync {
    /// Read a ref by full name. Returns `Ok(None)` if it does not exist.
    fn get(&self, name: &str) -> RefResult<Option<Ref>>;

    /// Point `name` at an object, creating or replacing the ref.
    fn put_ref(&self, name: &str, target: ObjectId) -> RefResult<()>;

    /// Point `name` at another ref, creating or replacing the ref.
    fn put_sym_ref(&self, name: &str, target: &str) -> RefResult<()>;

    /// Delete a ref, returning what it held.
    fn remove(&self, name: &str) -> RefResult<Option<Ref>>;

    /// Every ref whose name starts with `prefix`, keyed by name. Pass `""`
    /// for all refs.
    fn get_all(&self, prefix: &str) -> RefResult<BTreeMap<String, Ref>>;

    /// Release any resources held. The default does nothing.
    fn close(&self) -> RefResult<()> {
        Ok(())
    }

    /// The object id of a direct ref; `None` if absent or symbolic.
    fn get_ref(&self, name: &str) -> RefResult<Option<ObjectId>> {
        Ok(self.get(name)?.and_then(|r| r.object_id()))
    }

    /// The target name of a symbolic ref; `None` if absent or direct.
    fn get_sym_ref(&self, name: &str) -> RefResult<Option<String>> {
        Ok(self
            .get(name)?
            .and_then(|r| r.symbolic_target().map(str::to_string)))
    }

    /// Follow symbolic refs from `name` to an object id.
    ///
    /// Returns `Ok(None)` if any ref along the chain is missing.
    fn resolve(&self, name: &str) -> RefResult<Option<ObjectId>> {
        let mut current = name.to_string();
        for _ in 0..=MAX_SYMBOLIC_DEPTH {
            match self.get(&current)? {
                None => return Ok(None),
                Some(Ref::Direct { target, .. }) => return Ok(Some(target)),
                Some(Ref::Symbolic { target, .. }) => current = target,
            }
        }
        Err(RefError::SymbolicCycle {
            name: name.to_string(),
        })
    }
}

impl<T: RefDatabase + ?Sized> RefDatabase for Arc<T> {
    fn get(&self, name: &str) -> RefResult<Option<Ref>> {
        (**self).get(name)
    }

    fn put_ref(&self, name: &str, target: ObjectId) -> RefResult<()> {
        (**self).put_ref(name, target)
    }

    fn put_sym_ref(&self, name: &str, target: &str) -> RefResult<()> {
        (**self).put_sym_ref(name, target)
    }

    fn remove(&self, name: &str) -> RefResult<Option<Ref>> {
        (**self).remove(name)
    }

    fn get_all(&self, prefix: &str) -> RefResult<BTreeMap<String, Ref>> {
        (**self).get_all(prefix)
    }

    fn close(&self) -> RefResult<()> {
        (**self).close()
    }
}
