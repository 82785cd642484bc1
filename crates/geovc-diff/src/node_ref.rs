use geovc_store::{Node, NodeKind};
use geovc_types::{Envelope, ObjectId};
use serde::{Deserialize, Serialize};

/// Separator between the names of a path.
pub const PATH_SEPARATOR: char = '/';

/// Join a parent path and a child name.
pub fn append_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else if name.is_empty() {
        parent.to_string()
    } else {
        format!("{parent}{PATH_SEPARATOR}{name}")
    }
}

/// A tree entry together with where it sits in the tree.
///
/// `default_metadata_id` is the feature type inherited from the parent, used
/// when the node does not name one itself.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeRef {
    parent_path: String,
    node: Node,
    default_metadata_id: Option<ObjectId>,
}

impl NodeRef {
    pub fn new(
        parent_path: impl Into<String>,
        node: Node,
        default_metadata_id: Option<ObjectId>,
    ) -> Self {
        Self {
            parent_path: parent_path.into(),
            node,
            default_metadata_id,
        }
    }

    /// Reference to a root tree.
    pub fn root(tree_id: ObjectId) -> Self {
        Self::new("", Node::tree("", tree_id), None)
    }

    /// Reference to `node` as a child of `parent`.
    pub fn child_of(parent: &NodeRef, node: Node) -> Self {
        Self::new(parent.path(), node, parent.metadata_id())
    }

    pub fn is_root(&self) -> bool {
        self.parent_path.is_empty() && self.node.name().is_empty()
    }

    pub fn name(&self) -> &str {
        self.node.name()
    }

    pub fn parent_path(&self) -> &str {
        &self.parent_path
    }

    /// Full path from the root tree.
    pub fn path(&self) -> String {
        append_path(&self.parent_path, self.node.name())
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn kind(&self) -> NodeKind {
        self.node.kind()
    }

    pub fn object_id(&self) -> ObjectId {
        self.node.object_id()
    }

    /// The node's own feature type id, or the inherited one.
    pub fn metadata_id(&self) -> Option<ObjectId> {
        self.node.metadata_id().or(self.default_metadata_id)
    }

    pub fn default_metadata_id(&self) -> Option<ObjectId> {
        self.default_metadata_id
    }

    pub fn bounds(&self) -> Option<&Envelope> {
        self.node.bounds()
    }
}

/// Position of a bucket: the shard level and the bucket's index within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketIndex {
    pub depth: usize,
    pub index: u32,
}

impl BucketIndex {
    pub fn new(depth: usize, index: u32) -> Self {
        Self { depth, index }
    }
}
