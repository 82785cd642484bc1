use std::collections::BTreeMap;

use geovc_crypto::HashSink;
use geovc_types::{Envelope, FieldValue, ObjectId};
use serde::{Deserialize, Serialize};

/// What a tree entry points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Tree,
    Feature,
}

impl NodeKind {
    pub fn tag(&self) -> u8 {
        match self {
            Self::Tree => 0,
            Self::Feature => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Tree),
            1 => Some(Self::Feature),
            _ => None,
        }
    }
}

/// A named entry of a tree pointing at a child tree or a feature.
///
/// Nodes are ordered and deduplicated by `name` within a tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    name: String,
    kind: NodeKind,
    object_id: ObjectId,
    metadata_id: Option<ObjectId>,
    bounds: Option<Envelope>,
    extra_data: BTreeMap<String, FieldValue>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind, object_id: ObjectId) -> Self {
        Self {
            name: name.into(),
            kind,
            object_id,
            metadata_id: None,
            bounds: None,
            extra_data: BTreeMap::new(),
        }
    }

    pub fn tree(name: impl Into<String>, object_id: ObjectId) -> Self {
        Self::new(name, NodeKind::Tree, object_id)
    }

    pub fn feature(name: impl Into<String>, object_id: ObjectId) -> Self {
        Self::new(name, NodeKind::Feature, object_id)
    }

    /// Attach the id of the feature type describing this entry.
    pub fn with_metadata(mut self, metadata_id: ObjectId) -> Self {
        self.metadata_id = (!metadata_id.is_null()).then_some(metadata_id);
        self
    }

    /// Attach bounds; an empty envelope clears them.
    pub fn with_bounds(mut self, bounds: Envelope) -> Self {
        self.bounds = (!bounds.is_empty()).then_some(bounds);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.extra_data.insert(key.into(), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_tree(&self) -> bool {
        self.kind == NodeKind::Tree
    }

    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    pub fn metadata_id(&self) -> Option<ObjectId> {
        self.metadata_id
    }

    pub fn bounds(&self) -> Option<&Envelope> {
        self.bounds.as_ref()
    }

    pub fn extra_data(&self) -> &BTreeMap<String, FieldValue> {
        &self.extra_data
    }

    pub(crate) fn hash_into(&self, sink: &mut HashSink) {
        sink.put_str(&self.name)
            .put_u8(self.kind.tag())
            .put_id(&self.object_id)
            .put_opt_id(self.metadata_id.as_ref())
            .put_opt_envelope(self.bounds.as_ref())
            .put_u32(self.extra_data.len() as u32);
        for (key, value) in &self.extra_data {
            sink.put_str(key).put_value(value);
        }
    }
}

/// A pointer from a sharded tree to one of its shard trees.
#[derive(Clone, Debug, PartialEq)]
pub struct Bucket {
    index: u32,
    object_id: ObjectId,
    bounds: Option<Envelope>,
}

impl Bucket {
    pub fn new(index: u32, object_id: ObjectId, bounds: Option<Envelope>) -> Self {
        Self {
            index,
            object_id,
            bounds: bounds.filter(|b| !b.is_empty()),
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    pub fn bounds(&self) -> Option<&Envelope> {
        self.bounds.as_ref()
    }

    pub(crate) fn hash_into(&self, sink: &mut HashSink) {
        sink.put_u32(self.index)
            .put_id(&self.object_id)
            .put_opt_envelope(self.bounds.as_ref());
    }
}
