//! Commit graph for GeoVC.
//!
//! A [`GraphDatabase`] maps each commit id to its parent ids and keeps the
//! reverse child links, so history questions (ancestry, root commits,
//! distance to a root) are answered without decoding commit objects.
//! [`GraphIndexedStore`] wraps an object store and records every commit it
//! stores, keeping the two consistent per insert.

pub mod error;
pub mod indexed;
pub mod memory;
pub mod traits;

pub use error::{GraphError, GraphResult};
pub use indexed::GraphIndexedStore;
pub use memory::InMemoryGraphDatabase;
pub use traits::{Direction, GraphDatabase, GraphEdge};
