//! Revision objects and content-addressed object storage for GeoVC.
//!
//! Every piece of versioned data -- commits, trees, features, feature types,
//! tags -- is an immutable [`RevObject`] identified by the SHA-1 hash of its
//! canonical content (domain-separated by object type).
//!
//! # Trees
//!
//! A [`RevTree`] holds either direct entries ([`Node`]s) or, once it grows
//! past the fan-out threshold, hashed shards ([`Bucket`]s). [`TreeBuilder`]
//! builds trees bottom-up and can store a new root as a delta against the
//! tree it started from; a delta tree resolves its placeholders lazily and
//! always has the id of its materialized form.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//!
//! Long-lived handles can be shared through a [`StorePool`].
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written; `put` of a present id is a no-op.
//! 2. Concurrent `put`s of the same object have exactly one winner.
//! 3. Bulk operations never abort on a single failing item.
//! 4. The empty tree is resolvable from every store.

pub mod builder;
pub mod config;
pub mod error;
pub mod memory;
pub mod object;
pub mod pool;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use builder::{bucket_of, build_tree, TreeBuilder};
pub use config::{DeltaConfig, PoolConfig, StoreConfig, TreeConfig};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use object::{
    empty_tree_id, encode_delta, hash_tree, reuse_ratio, Bucket, Node, NodeKind, Person,
    PropertyDescriptor, RevCommit, RevFeature, RevFeatureType, RevObject, RevObjectType, RevTag,
    RevTree, Slot,
};
pub use pool::{PooledStore, StorePool};
pub use traits::{
    normalize_partial_id, BulkOpListener, CountingListener, NoopListener, ObjectStore,
    MIN_PARTIAL_ID_LEN,
};
