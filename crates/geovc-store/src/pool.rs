//! A bounded pool of open store handles.
//!
//! The pool is an explicit value that callers pass down; there is no global
//! registry. Handles are reference counted and a store becomes idle once its
//! last handle is dropped. Idle stores are closed after
//! [`PoolConfig::idle_timeout`], when room is needed for another store, or
//! when the pool is closed.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;

struct PoolEntry<S> {
    store: Arc<S>,
    handles: usize,
    last_released: Instant,
}

impl<S> PoolEntry<S> {
    fn is_idle(&self) -> bool {
        self.handles == 0
    }
}

/// Pool of open stores keyed by location.
pub struct StorePool<S: ObjectStore> {
    config: PoolConfig,
    entries: Mutex<HashMap<String, PoolEntry<S>>>,
    closing: AtomicBool,
}

impl<S: ObjectStore + 'static> StorePool<S> {
    pub fn new(config: PoolConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            entries: Mutex::new(HashMap::new()),
            closing: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Get a handle to the store at `key`, opening it with `open_fn` if the
    /// pool does not hold it yet.
    ///
    /// When the pool is full the least recently released idle store is
    /// evicted; if every store is in use this fails with
    /// [`StoreError::PoolExhausted`].
    pub fn acquire<F>(self: &Arc<Self>, key: &str, open_fn: F) -> StoreResult<PooledStore<S>>
    where
        F: FnOnce() -> StoreResult<S>,
    {
        if self.is_closing() {
            return Err(StoreError::Closed);
        }

        let mut evicted = None;
        let store = {
            let mut entries = self.lock()?;
            if let Some(entry) = entries.get_mut(key) {
                entry.handles += 1;
                Arc::clone(&entry.store)
            } else {
                let lru = if entries.len() >= self.config.max_size {
                    let lru = entries
                        .iter()
                        .filter(|(_, e)| e.is_idle())
                        .min_by_key(|(_, e)| e.last_released)
                        .map(|(k, _)| k.clone())
                        .ok_or(StoreError::PoolExhausted {
                            max_size: self.config.max_size,
                        })?;
                    Some(lru)
                } else {
                    None
                };
                // the idle store stays pooled unless the new one opens
                let store = open_fn()?;
                if !store.is_open() {
                    store.open()?;
                }
                if let Some(lru) = lru {
                    evicted = entries.remove(&lru).map(|e| (lru, e.store));
                }
                let store = Arc::new(store);
                entries.insert(
                    key.to_string(),
                    PoolEntry {
                        store: Arc::clone(&store),
                        handles: 1,
                        last_released: Instant::now(),
                    },
                );
                debug!(key, "opened pooled store");
                store
            }
        };

        if let Some((lru, store)) = evicted {
            close_logged(&lru, &store);
        }
        Ok(PooledStore {
            pool: Arc::clone(self),
            key: key.to_string(),
            store,
        })
    }

    fn release(&self, key: &str) -> StoreResult<()> {
        let to_close = {
            let mut entries = self.lock()?;
            let Some(entry) = entries.get_mut(key) else {
                return Ok(());
            };
            entry.handles = entry.handles.saturating_sub(1);
            entry.last_released = Instant::now();
            if entry.is_idle() && self.is_closing() {
                entries.remove(key).map(|e| e.store)
            } else {
                None
            }
        };
        if let Some(store) = to_close {
            close_logged(key, &store);
        }
        Ok(())
    }

    /// Close every store that has been idle for at least the idle timeout.
    /// Returns how many were closed.
    pub fn evict_idle(&self) -> StoreResult<usize> {
        let timeout = self.config.idle_timeout();
        let expired = self.take_idle(|e| e.last_released.elapsed() >= timeout)?;
        for (key, store) in &expired {
            close_logged(key, store);
        }
        Ok(expired.len())
    }

    fn take_idle(
        &self,
        pred: impl Fn(&PoolEntry<S>) -> bool,
    ) -> StoreResult<Vec<(String, Arc<S>)>> {
        let mut entries = self.lock()?;
        let keys: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_idle() && pred(e))
            .map(|(k, _)| k.clone())
            .collect();
        Ok(keys
            .into_iter()
            .filter_map(|k| entries.remove(&k).map(|e| (k, e.store)))
            .collect())
    }

    /// Stop handing out stores and close every idle one. Stores still in use
    /// are closed when their last handle is dropped.
    pub fn close(&self) -> StoreResult<()> {
        self.closing.store(true, Ordering::Release);
        for (key, store) in self.take_idle(|_| true)? {
            close_logged(&key, &store);
        }
        Ok(())
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Number of stores held, idle or not.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Live handles to the store at `key`.
    pub fn handles(&self, key: &str) -> StoreResult<usize> {
        Ok(self.lock()?.get(key).map_or(0, |e| e.handles))
    }

    /// Run [`evict_idle`](Self::evict_idle) every `period` on the tokio
    /// runtime. The task holds only a weak reference and ends once the pool
    /// is dropped or closed.
    pub fn spawn_evictor(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let pool: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(pool) = pool.upgrade() else {
                    break;
                };
                if pool.is_closing() {
                    break;
                }
                match pool.evict_idle() {
                    Ok(0) => {}
                    Ok(n) => debug!(evicted = n, "closed idle pooled stores"),
                    Err(e) => warn!(error = %e, "idle eviction failed"),
                }
            }
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<String, PoolEntry<S>>>> {
        self.entries
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

fn close_logged<S: ObjectStore>(key: &str, store: &Arc<S>) {
    match store.close() {
        Ok(()) => debug!(key, "closed pooled store"),
        Err(e) => warn!(key, error = %e, "failed to close pooled store"),
    }
}

/// A handle to a pooled store. Dropping it releases the store to the pool.
pub struct PooledStore<S: ObjectStore + 'static> {
    pool: Arc<StorePool<S>>,
    key: String,
    store: Arc<S>,
}

impl<S: ObjectStore + 'static> PooledStore<S> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// A shared reference to the underlying store that outlives this handle.
    pub fn shared(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }
}

impl<S: ObjectStore + 'static> Deref for PooledStore<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.store
    }
}

impl<S: ObjectStore + 'static> Drop for PooledStore<S> {
    fn drop(&mut self) {
        if let Err(e) = self.pool.release(&self.key) {
            warn!(key = %self.key, error = %e, "failed to release pooled store");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryObjectStore;
    use crate::object::RevFeature;
    use geovc_types::FieldValue;

    fn pool(max_size: usize, idle_timeout_ms: u64) -> Arc<StorePool<InMemoryObjectStore>> {
        StorePool::new(PoolConfig {
            max_size,
            idle_timeout_ms,
        })
    }

    fn open() -> StoreResult<InMemoryObjectStore> {
        Ok(InMemoryObjectStore::new())
    }

    #[test]
    fn same_key_shares_store() {
        let pool = pool(4, 60_000);
        let a = pool.acquire("repo", open).unwrap();
        let b = pool
            .acquire("repo", || panic!("must reuse the open store"))
            .unwrap();
        assert!(Arc::ptr_eq(&a.shared(), &b.shared()));
        assert_eq!(pool.handles("repo").unwrap(), 2);

        let obj = RevFeature::new(vec![FieldValue::Long(1)]).into();
        assert!(a.put(&obj).unwrap());
        assert!(b.exists(&obj.id()).unwrap());

        drop(a);
        assert_eq!(pool.handles("repo").unwrap(), 1);
        drop(b);
        assert_eq!(pool.handles("repo").unwrap(), 0);
        assert_eq!(pool.len().unwrap(), 1);
    }

    #[test]
    fn idle_stores_are_evicted_and_closed() {
        let pool = pool(4, 0);
        let handle = pool.acquire("repo", open).unwrap();
        let store = handle.shared();
        assert_eq!(pool.evict_idle().unwrap(), 0);

        drop(handle);
        assert_eq!(pool.evict_idle().unwrap(), 1);
        assert!(!store.is_open());
        assert!(pool.is_empty().unwrap());
    }

    #[test]
    fn full_pool_evicts_lru_idle_or_fails() {
        let pool = pool(1, 60_000);
        let first = pool.acquire("a", open).unwrap();
        let a_store = first.shared();
        assert!(matches!(
            pool.acquire("b", open),
            Err(StoreError::PoolExhausted { max_size: 1 })
        ));

        drop(first);
        let second = pool.acquire("b", open).unwrap();
        assert_eq!(second.key(), "b");
        assert!(!a_store.is_open());
        assert_eq!(pool.len().unwrap(), 1);
    }

    #[test]
    fn close_waits_for_in_use_stores() {
        let pool = pool(4, 60_000);
        let busy = pool.acquire("busy", open).unwrap();
        let idle = pool.acquire("idle", open).unwrap();
        let busy_store = busy.shared();
        let idle_store = idle.shared();
        drop(idle);

        pool.close().unwrap();
        assert!(!idle_store.is_open());
        assert!(busy_store.is_open());
        assert!(matches!(pool.acquire("x", open), Err(StoreError::Closed)));

        drop(busy);
        assert!(!busy_store.is_open());
        assert!(pool.is_empty().unwrap());
    }

    #[test]
    fn open_failure_is_propagated() {
        let pool = pool(4, 60_000);
        let err = pool
            .acquire("bad", || Err(StoreError::Config("no such repo".into())))
            .err();
        assert!(matches!(err, Some(StoreError::Config(_))));
        assert!(pool.is_empty().unwrap());
    }

    #[test]
    fn failed_open_keeps_idle_store_pooled() {
        let pool = pool(1, 60_000);
        let a_store = pool.acquire("a", open).unwrap().shared();

        let err = pool
            .acquire("b", || Err(StoreError::Config("boom".into())))
            .err();
        assert!(matches!(err, Some(StoreError::Config(_))));
        assert!(a_store.is_open());
        assert_eq!(pool.len().unwrap(), 1);
        assert_eq!(pool.handles("a").unwrap(), 0);

        // the retained store can still be evicted later
        let b = pool.acquire("b", open).unwrap();
        assert_eq!(b.key(), "b");
        assert!(!a_store.is_open());
    }

    #[tokio::test]
    async fn background_evictor_closes_idle_stores() {
        let pool = pool(4, 0);
        let store = pool.acquire("repo", open).unwrap().shared();
        let task = pool.spawn_evictor(Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(pool.is_empty().unwrap());
        assert!(!store.is_open());

        drop(pool);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("evictor should stop once the pool is dropped")
            .unwrap();
    }
}
