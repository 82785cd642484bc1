//! Tree comparison for GeoVC.
//!
//! [`PreOrderDiffWalk`] walks two revision trees side by side and reports
//! every entry that differs, parents before children, letting the consumer
//! prune subtrees and buckets it is not interested in.
//! [`PostOrderDiffWalk`] reports the same differences with containers after
//! their contents. [`ChangeCollector`] turns a walk into a list of
//! [`DiffEntry`] values.

pub mod collector;
pub mod error;
pub mod node_ref;
pub mod post_order;
pub mod pre_order;

pub use collector::{diff_trees, ChangeCollector, ChangeType, DiffEntry};
pub use error::{DiffError, DiffResult};
pub use node_ref::{append_path, BucketIndex, NodeRef, PATH_SEPARATOR};
pub use post_order::{ObjectIdCollector, PostOrderConsumer, PostOrderDiffWalk};
pub use pre_order::{PreOrderConsumer, PreOrderDiffWalk};
