//! Reference management for GeoVC.
//!
//! Refs are the human-readable entry points into history: names such as
//! `refs/heads/master` that point at a commit id, or symbolic refs such as
//! `HEAD` that point at another ref.
//!
//! # Modules
//!
//! - [`error`] -- Error types for ref operations
//! - [`types`] -- [`Ref`] and the well-known names and prefixes
//! - [`traits`] -- The [`RefDatabase`] trait defining the storage interface
//! - [`names`] -- Ref name validation
//! - [`memory`] -- In-memory [`InMemoryRefDatabase`]
//! - [`snapshot`] -- [`SnapshotRefDatabase`], a cached read-only view

pub mod error;
pub mod memory;
pub mod names;
pub mod snapshot;
pub mod traits;
pub mod types;

pub use error::{RefError, RefResult};
pub use memory::InMemoryRefDatabase;
pub use names::{validate_branch_name, validate_ref_name, validate_tag_name};
pub use snapshot::SnapshotRefDatabase;
pub use traits::{RefDatabase, MAX_SYMBOLIC_DEPTH};
pub use types::{
    branch_ref, remote_ref, tag_ref, Ref, HEAD, HEADS_PREFIX, MASTER, REFS_PREFIX,
    REMOTES_PREFIX, STAGE_HEAD, TAGS_PREFIX, WORK_HEAD,
};
