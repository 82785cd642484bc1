use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

use geovc_crypto::ContentHasher;
use geovc_types::{Envelope, ObjectId};

use super::node::{Bucket, Node, NodeKind};
use crate::error::{StoreError, StoreResult};

/// Hash the content of a tree.
///
/// Nodes are canonicalized by name and buckets by index, so the result does
/// not depend on the order of the input slices. `size` and `num_trees` are
/// derived values and do not take part in a tree's identity.
pub fn hash_tree(trees: &[Node], features: &[Node], buckets: &[Bucket]) -> ObjectId {
    let mut trees: Vec<&Node> = trees.iter().collect();
    trees.sort_by(|a, b| a.name().cmp(b.name()));
    let mut features: Vec<&Node> = features.iter().collect();
    features.sort_by(|a, b| a.name().cmp(b.name()));
    let mut buckets: Vec<&Bucket> = buckets.iter().collect();
    buckets.sort_by_key(|b| b.index());

    let mut sink = ContentHasher::TREE.start();
    sink.put_u32(trees.len() as u32);
    for node in trees {
        node.hash_into(&mut sink);
    }
    sink.put_u32(features.len() as u32);
    for node in features {
        node.hash_into(&mut sink);
    }
    sink.put_u32(buckets.len() as u32);
    for bucket in buckets {
        bucket.hash_into(&mut sink);
    }
    sink.finish()
}

/// Id of the tree with no entries.
pub fn empty_tree_id() -> ObjectId {
    static ID: OnceLock<ObjectId> = OnceLock::new();
    *ID.get_or_init(|| hash_tree(&[], &[], &[]))
}

/// An entry of a delta tree: either a value of its own or a position in the
/// original tree's corresponding list.
///
/// For nodes the position indexes `original.trees()` or `original.features()`;
/// for buckets it is the bucket index in the original.
#[derive(Clone, Debug, PartialEq)]
pub enum Slot<T> {
    Literal(T),
    Placeholder(usize),
}

impl<T> Slot<T> {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }
}

struct TreeData {
    id: ObjectId,
    size: u64,
    num_trees: u32,
    trees: Vec<Slot<Node>>,
    features: Vec<Slot<Node>>,
    buckets: BTreeMap<u32, Slot<Bucket>>,
    original: Option<RevTree>,
}

/// An immutable tree: either direct entries (`trees` and `features`) or
/// shard `buckets`, never both.
///
/// A delta tree keeps a shared handle to its already resolved original and
/// stores placeholders for the entries it shares with it. Originals are
/// always older trees, so the handles never form a cycle. Every accessor resolves placeholders, so a
/// delta tree reads exactly like its materialized form. Cloning is cheap.
#[derive(Clone)]
pub struct RevTree(Arc<TreeData>);

impl RevTree {
    /// Build a literal tree, computing its id.
    ///
    /// Fails with [`StoreError::InvalidArgument`] on duplicate names, duplicate
    /// bucket indices, a node filed under the wrong kind, or a tree that mixes
    /// direct entries with buckets.
    pub fn new(
        size: u64,
        num_trees: u32,
        mut trees: Vec<Node>,
        mut features: Vec<Node>,
        buckets: Vec<Bucket>,
    ) -> StoreResult<Self> {
        if (!trees.is_empty() || !features.is_empty()) && !buckets.is_empty() {
            return Err(StoreError::InvalidArgument(
                "a tree cannot hold both direct entries and buckets".into(),
            ));
        }
        if trees.iter().any(|n| n.kind() != NodeKind::Tree)
            || features.iter().any(|n| n.kind() != NodeKind::Feature)
        {
            return Err(StoreError::InvalidArgument(
                "node kind does not match the list it was placed in".into(),
            ));
        }
        trees.sort_by(|a, b| a.name().cmp(b.name()));
        features.sort_by(|a, b| a.name().cmp(b.name()));
        check_unique_names(&trees, &features)?;

        let mut by_index = BTreeMap::new();
        for bucket in &buckets {
            if by_index.insert(bucket.index(), bucket.clone()).is_some() {
                return Err(StoreError::InvalidArgument(format!(
                    "duplicate bucket index {}",
                    bucket.index()
                )));
            }
        }

        let id = hash_tree(&trees, &features, &buckets);
        Ok(Self(Arc::new(TreeData {
            id,
            size,
            num_trees,
            trees: trees.into_iter().map(Slot::Literal).collect(),
            features: features.into_iter().map(Slot::Literal).collect(),
            buckets: by_index
                .into_iter()
                .map(|(i, b)| (i, Slot::Literal(b)))
                .collect(),
            original: None,
        })))
    }

    /// Build a tree of features only.
    pub fn from_features(features: Vec<Node>) -> StoreResult<Self> {
        let size = features.len() as u64;
        Self::new(size, 0, Vec::new(), features, Vec::new())
    }

    /// Build a sharded tree.
    pub fn from_buckets(size: u64, num_trees: u32, buckets: Vec<Bucket>) -> StoreResult<Self> {
        Self::new(size, num_trees, Vec::new(), Vec::new(), buckets)
    }

    /// Build a delta tree against `original`.
    ///
    /// Every placeholder must resolve in `original`, and hashing the resolved
    /// content must reproduce `id`; otherwise this fails with
    /// [`StoreError::Corrupt`] or [`StoreError::DeltaHashMismatch`].
    pub fn delta(
        id: ObjectId,
        size: u64,
        num_trees: u32,
        original: RevTree,
        trees: Vec<Slot<Node>>,
        features: Vec<Slot<Node>>,
        buckets: BTreeMap<u32, Slot<Bucket>>,
    ) -> StoreResult<Self> {
        let tree = Self(Arc::new(TreeData {
            id,
            size,
            num_trees,
            trees,
            features,
            buckets,
            original: Some(original),
        }));

        let corrupt = |reason: String| StoreError::Corrupt { id, reason };
        let resolved_trees = tree.resolve_all(&tree.0.trees, |t, i| t.tree_at(i), "tree")?;
        let resolved_features =
            tree.resolve_all(&tree.0.features, |t, i| t.feature_at(i), "feature")?;
        let mut resolved_buckets = Vec::with_capacity(tree.0.buckets.len());
        for (&index, slot) in &tree.0.buckets {
            let bucket = tree
                .bucket(index)
                .ok_or_else(|| corrupt(format!("unresolvable bucket placeholder {index}")))?;
            if let Slot::Placeholder(p) = slot {
                if *p != index as usize {
                    return Err(corrupt(format!(
                        "bucket {index} points at original bucket {p}"
                    )));
                }
            }
            resolved_buckets.push(bucket.clone());
        }

        if (!resolved_trees.is_empty() || !resolved_features.is_empty())
            && !resolved_buckets.is_empty()
        {
            return Err(corrupt("delta mixes direct entries and buckets".into()));
        }
        if !is_strictly_sorted(&resolved_trees) || !is_strictly_sorted(&resolved_features) {
            return Err(corrupt("delta entries are not in name order".into()));
        }

        let computed = hash_tree(&resolved_trees, &resolved_features, &resolved_buckets);
        if computed != id {
            return Err(StoreError::DeltaHashMismatch {
                expected: id,
                computed,
            });
        }
        Ok(tree)
    }

    fn resolve_all<'a>(
        &'a self,
        slots: &[Slot<Node>],
        at: impl Fn(&'a RevTree, usize) -> Option<&'a Node>,
        what: &str,
    ) -> StoreResult<Vec<Node>> {
        (0..slots.len())
            .map(|i| {
                at(self, i).cloned().ok_or_else(|| StoreError::Corrupt {
                    id: self.0.id,
                    reason: format!("unresolvable {what} placeholder at position {i}"),
                })
            })
            .collect()
    }

    /// The tree with no entries.
    pub fn empty() -> Self {
        static EMPTY: OnceLock<RevTree> = OnceLock::new();
        EMPTY
            .get_or_init(|| {
                Self(Arc::new(TreeData {
                    id: empty_tree_id(),
                    size: 0,
                    num_trees: 0,
                    trees: Vec::new(),
                    features: Vec::new(),
                    buckets: BTreeMap::new(),
                    original: None,
                }))
            })
            .clone()
    }

    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Total number of features reachable from this tree.
    pub fn size(&self) -> u64 {
        self.0.size
    }

    /// Total number of tree entries reachable from this tree.
    pub fn num_trees(&self) -> u32 {
        self.0.num_trees
    }

    pub fn is_empty(&self) -> bool {
        self.0.trees.is_empty() && self.0.features.is_empty() && self.0.buckets.is_empty()
    }

    pub fn is_sharded(&self) -> bool {
        !self.0.buckets.is_empty()
    }

    pub fn is_delta(&self) -> bool {
        self.0.original.is_some()
    }

    /// Length of the chain of originals behind this tree; `0` for literal trees.
    pub fn delta_level(&self) -> u32 {
        self.0.original.as_ref().map_or(0, |o| o.delta_level() + 1)
    }

    pub fn original(&self) -> Option<&RevTree> {
        self.0.original.as_ref()
    }

    pub fn tree_count(&self) -> usize {
        self.0.trees.len()
    }

    pub fn feature_count(&self) -> usize {
        self.0.features.len()
    }

    pub fn bucket_count(&self) -> usize {
        self.0.buckets.len()
    }

    /// Child tree entry at position `i`, resolved.
    pub fn tree_at(&self, i: usize) -> Option<&Node> {
        match self.0.trees.get(i)? {
            Slot::Literal(node) => Some(node),
            Slot::Placeholder(p) => self.0.original.as_ref()?.tree_at(*p),
        }
    }

    /// Feature entry at position `i`, resolved.
    pub fn feature_at(&self, i: usize) -> Option<&Node> {
        match self.0.features.get(i)? {
            Slot::Literal(node) => Some(node),
            Slot::Placeholder(p) => self.0.original.as_ref()?.feature_at(*p),
        }
    }

    /// Bucket at `index`, resolved.
    pub fn bucket(&self, index: u32) -> Option<&Bucket> {
        match self.0.buckets.get(&index)? {
            Slot::Literal(bucket) => Some(bucket),
            Slot::Placeholder(p) => self.0.original.as_ref()?.bucket(*p as u32),
        }
    }

    /// Child tree entries in name order.
    pub fn trees(&self) -> impl Iterator<Item = &Node> + '_ {
        (0..self.0.trees.len()).filter_map(move |i| self.tree_at(i))
    }

    /// Feature entries in name order.
    pub fn features(&self) -> impl Iterator<Item = &Node> + '_ {
        (0..self.0.features.len()).filter_map(move |i| self.feature_at(i))
    }

    /// Buckets in index order.
    pub fn buckets(&self) -> impl Iterator<Item = &Bucket> + '_ {
        self.0.buckets.keys().filter_map(move |i| self.bucket(*i))
    }

    /// Trees and features merged in name order.
    pub fn entries(&self) -> Vec<&Node> {
        let mut all: Vec<&Node> = self.trees().chain(self.features()).collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Direct entry called `name`, if any.
    pub fn find(&self, name: &str) -> Option<&Node> {
        search(self.0.trees.len(), name, |i| self.tree_at(i))
            .and_then(|i| self.tree_at(i))
            .or_else(|| {
                search(self.0.features.len(), name, |i| self.feature_at(i))
                    .and_then(|i| self.feature_at(i))
            })
    }

    /// Position of the child tree entry called `name`.
    pub fn tree_position(&self, name: &str) -> Option<usize> {
        search(self.0.trees.len(), name, |i| self.tree_at(i))
    }

    /// Position of the feature entry called `name`.
    pub fn feature_position(&self, name: &str) -> Option<usize> {
        search(self.0.features.len(), name, |i| self.feature_at(i))
    }

    /// Raw child tree slots, placeholders unresolved.
    pub fn tree_slots(&self) -> &[Slot<Node>] {
        &self.0.trees
    }

    /// Raw feature slots, placeholders unresolved.
    pub fn feature_slots(&self) -> &[Slot<Node>] {
        &self.0.features
    }

    /// Raw bucket slots, placeholders unresolved.
    pub fn bucket_slots(&self) -> &BTreeMap<u32, Slot<Bucket>> {
        &self.0.buckets
    }

    /// Union of the bounds of every entry and bucket.
    pub fn bounds(&self) -> Option<Envelope> {
        Envelope::union_of(
            self.trees()
                .chain(self.features())
                .map(Node::bounds)
                .chain(self.buckets().map(Bucket::bounds)),
        )
    }

    /// The same tree with every placeholder replaced by its resolved value.
    pub fn materialize(&self) -> RevTree {
        if !self.is_delta() {
            return self.clone();
        }
        Self(Arc::new(TreeData {
            id: self.0.id,
            size: self.0.size,
            num_trees: self.0.num_trees,
            trees: self.trees().cloned().map(Slot::Literal).collect(),
            features: self.features().cloned().map(Slot::Literal).collect(),
            buckets: self
                .buckets()
                .map(|b| (b.index(), Slot::Literal(b.clone())))
                .collect(),
            original: None,
        }))
    }
}

fn search<'a>(len: usize, name: &str, at: impl Fn(usize) -> Option<&'a Node>) -> Option<usize> {
    let (mut lo, mut hi) = (0, len);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match at(mid)?.name().cmp(name) {
            std::cmp::Ordering::Less => lo = mid + 1,
            std::cmp::Ordering::Greater => hi = mid,
            std::cmp::Ordering::Equal => return Some(mid),
        }
    }
    None
}

fn is_strictly_sorted(nodes: &[Node]) -> bool {
    nodes.windows(2).all(|w| w[0].name() < w[1].name())
}

fn check_unique_names(trees: &[Node], features: &[Node]) -> StoreResult<()> {
    let mut seen = BTreeSet::new();
    for node in trees.iter().chain(features) {
        if !seen.insert(node.name()) {
            return Err(StoreError::InvalidArgument(format!(
                "duplicate entry name {:?}",
                node.name()
            )));
        }
    }
    Ok(())
}

impl PartialEq for RevTree {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
            && self.0.size == other.0.size
            && self.0.num_trees == other.0.num_trees
    }
}

impl fmt::Debug for RevTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevTree")
            .field("id", &self.0.id)
            .field("size", &self.0.size)
            .field("num_trees", &self.0.num_trees)
            .field("trees", &self.0.trees.len())
            .field("features", &self.0.features.len())
            .field("buckets", &self.0.buckets.len())
            .field("delta_level", &self.delta_level())
            .finish()
    }
}
