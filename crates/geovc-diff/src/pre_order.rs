//! Pre-order dual-tree walk.
//!
//! The walk descends two trees in lockstep and calls back on every pair of
//! entries that differ. Subtrees and buckets with equal ids on both sides are
//! never loaded, so the cost of a diff is proportional to the size of the
//! change rather than the size of the trees.
//!
//! Two trees holding the same entries may be shaped differently: one side
//! may keep its entries directly while the other has split them into
//! buckets, and either side may be a delta tree. The walk partitions direct
//! entries with [`bucket_of`] at the current depth so that both sides are
//! compared shard by shard, and it only ever looks at resolved entries, so
//! the reported changes do not depend on how either tree is stored.

use std::collections::{BTreeMap, BTreeSet};

use geovc_store::{bucket_of, Bucket, Node, NodeKind, ObjectStore, RevTree, TreeConfig};
use geovc_types::ObjectId;
use tracing::{debug, warn};

use crate::error::{DiffError, DiffResult};
use crate::node_ref::{BucketIndex, NodeRef};

/// Receives the differences found by a [`PreOrderDiffWalk`].
///
/// Either side of a pair may be absent: an entry only on the right was
/// added, one only on the left was removed. The root trees are reported
/// through [`tree`](Self::tree) like any other subtree, with
/// [`NodeRef::is_root`] set.
pub trait PreOrderConsumer {
    /// A pair of subtrees that differ. Return `false` to skip their contents.
    fn tree(&mut self, _left: Option<&NodeRef>, _right: Option<&NodeRef>) -> bool {
        true
    }

    /// Called after the contents of a subtree pair, whether or not they were
    /// visited.
    fn end_tree(&mut self, _left: Option<&NodeRef>, _right: Option<&NodeRef>) {}

    /// A pair of buckets that differ. Return `false` to skip their contents.
    ///
    /// A side whose entries are held directly, rather than in a bucket, is
    /// reported as `None` even when it has entries that fall into `index`.
    fn bucket(
        &mut self,
        _left_parent: Option<&NodeRef>,
        _right_parent: Option<&NodeRef>,
        _index: &BucketIndex,
        _left: Option<&Bucket>,
        _right: Option<&Bucket>,
    ) -> bool {
        true
    }

    fn end_bucket(
        &mut self,
        _left_parent: Option<&NodeRef>,
        _right_parent: Option<&NodeRef>,
        _index: &BucketIndex,
        _left: Option<&Bucket>,
        _right: Option<&Bucket>,
    ) {
    }

    /// A pair of features that differ. Return `false` to stop the walk.
    fn feature(&mut self, left: Option<&NodeRef>, right: Option<&NodeRef>) -> bool;

    /// Called once when the walk finishes, including after an early stop.
    fn complete(&mut self) {}
}

/// Compares two trees, each read from its own store.
pub struct PreOrderDiffWalk<'a> {
    left: RevTree,
    right: RevTree,
    left_store: &'a dyn ObjectStore,
    right_store: &'a dyn ObjectStore,
    bucket_count: u32,
    verify: bool,
}

impl<'a> PreOrderDiffWalk<'a> {
    pub fn new(
        left: RevTree,
        right: RevTree,
        left_store: &'a dyn ObjectStore,
        right_store: &'a dyn ObjectStore,
    ) -> Self {
        Self {
            left,
            right,
            left_store,
            right_store,
            bucket_count: TreeConfig::default().bucket_count,
            verify: false,
        }
    }

    /// Use the bucket count the trees were built with.
    pub fn with_tree_config(mut self, config: &TreeConfig) -> Self {
        self.bucket_count = config.bucket_count;
        self
    }

    /// When set, every feature and tree that is reported must exist in its
    /// store; a missing one fails the walk with [`DiffError::MissingObject`].
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn left(&self) -> &RevTree {
        &self.left
    }

    pub fn right(&self) -> &RevTree {
        &self.right
    }

    /// Run the walk, feeding every difference to `consumer`.
    pub fn walk<C: PreOrderConsumer + ?Sized>(&self, consumer: &mut C) -> DiffResult<()> {
        let mut walker = Walker {
            walk: self,
            consumer,
            stopped: false,
        };
        let result = walker.run();
        walker.consumer.complete();
        result
    }
}

/// Which side of the walk a lookup is for.
#[derive(Clone, Copy, Debug)]
enum Side {
    Left,
    Right,
}

/// The contents of one tree level: direct entries in name order, or buckets.
enum Level {
    Entries(Vec<Node>),
    Buckets(BTreeMap<u32, Bucket>),
}

impl Level {
    fn of(tree: &RevTree) -> Self {
        if tree.is_sharded() {
            Self::Buckets(tree.buckets().map(|b| (b.index(), b.clone())).collect())
        } else {
            Self::Entries(tree.entries().into_iter().cloned().collect())
        }
    }
}

/// What one side holds under a single bucket index.
enum Shard {
    Bucket(Bucket),
    Entries(Vec<Node>),
    Absent,
}

impl Shard {
    fn bucket(&self) -> Option<&Bucket> {
        match self {
            Self::Bucket(b) => Some(b),
            _ => None,
        }
    }
}

struct Walker<'w, 'a, C: ?Sized> {
    walk: &'w PreOrderDiffWalk<'a>,
    consumer: &'w mut C,
    stopped: bool,
}

impl<C: PreOrderConsumer + ?Sized> Walker<'_, '_, C> {
    fn run(&mut self) -> DiffResult<()> {
        let walk = self.walk;
        if walk.left.id() == walk.right.id() {
            return Ok(());
        }
        debug!(
            left = %walk.left.id().short_hex(),
            right = %walk.right.id().short_hex(),
            "starting tree diff"
        );
        let left = NodeRef::root(walk.left.id());
        let right = NodeRef::root(walk.right.id());
        if self.consumer.tree(Some(&left), Some(&right)) {
            self.compare(
                Level::of(&walk.left),
                Level::of(&walk.right),
                Some(&left),
                Some(&right),
                0,
            )?;
        }
        self.consumer.end_tree(Some(&left), Some(&right));
        Ok(())
    }

    fn store(&self, side: Side) -> &dyn ObjectStore {
        match side {
            Side::Left => self.walk.left_store,
            Side::Right => self.walk.right_store,
        }
    }

    fn compare(
        &mut self,
        left: Level,
        right: Level,
        left_parent: Option<&NodeRef>,
        right_parent: Option<&NodeRef>,
        depth: usize,
    ) -> DiffResult<()> {
        if let (Level::Entries(l), Level::Entries(r)) = (&left, &right) {
            return self.compare_entries(l, r, left_parent, right_parent);
        }

        let mut left = self.shards(left, depth);
        let mut right = self.shards(right, depth);
        let indexes: BTreeSet<u32> = left.keys().chain(right.keys()).copied().collect();
        for index in indexes {
            if self.stopped {
                break;
            }
            let l = left.remove(&index).unwrap_or(Shard::Absent);
            let r = right.remove(&index).unwrap_or(Shard::Absent);
            self.compare_shards(l, r, left_parent, right_parent, BucketIndex::new(depth, index))?;
        }
        Ok(())
    }

    /// Split a level into per-bucket shards as if it were sharded at `depth`.
    fn shards(&self, level: Level, depth: usize) -> BTreeMap<u32, Shard> {
        match level {
            Level::Buckets(buckets) => buckets
                .into_iter()
                .map(|(index, b)| (index, Shard::Bucket(b)))
                .collect(),
            Level::Entries(entries) => {
                let mut parts: BTreeMap<u32, Vec<Node>> = BTreeMap::new();
                for node in entries {
                    let index = bucket_of(node.name(), depth, self.walk.bucket_count);
                    parts.entry(index).or_default().push(node);
                }
                parts
                    .into_iter()
                    .map(|(index, nodes)| (index, Shard::Entries(nodes)))
                    .collect()
            }
        }
    }

    fn compare_shards(
        &mut self,
        left: Shard,
        right: Shard,
        left_parent: Option<&NodeRef>,
        right_parent: Option<&NodeRef>,
        index: BucketIndex,
    ) -> DiffResult<()> {
        let (lb, rb) = (left.bucket().cloned(), right.bucket().cloned());
        match (&lb, &rb) {
            (Some(l), Some(r)) if l.object_id() == r.object_id() => return Ok(()),
            (None, None) => {
                let left = self.shard_level(left, Side::Left, left_parent)?;
                let right = self.shard_level(right, Side::Right, right_parent)?;
                return self.compare(left, right, left_parent, right_parent, index.depth + 1);
            }
            _ => {}
        }

        if self
            .consumer
            .bucket(left_parent, right_parent, &index, lb.as_ref(), rb.as_ref())
        {
            let left = self.shard_level(left, Side::Left, left_parent)?;
            let right = self.shard_level(right, Side::Right, right_parent)?;
            self.compare(left, right, left_parent, right_parent, index.depth + 1)?;
        }
        self.consumer
            .end_bucket(left_parent, right_parent, &index, lb.as_ref(), rb.as_ref());
        Ok(())
    }

    fn shard_level(
        &self,
        shard: Shard,
        side: Side,
        parent: Option<&NodeRef>,
    ) -> DiffResult<Level> {
        match shard {
            Shard::Bucket(b) => {
                let path = parent.map(NodeRef::path).unwrap_or_default();
                let tree = self.load_tree(side, b.object_id(), path)?;
                Ok(Level::of(&tree))
            }
            Shard::Entries(nodes) => Ok(Level::Entries(nodes)),
            Shard::Absent => Ok(Level::Entries(Vec::new())),
        }
    }

    /// Merge-join two name-sorted entry lists.
    fn compare_entries(
        &mut self,
        left: &[Node],
        right: &[Node],
        left_parent: Option<&NodeRef>,
        right_parent: Option<&NodeRef>,
    ) -> DiffResult<()> {
        let (mut i, mut j) = (0, 0);
        while !self.stopped {
            let (l, r) = match (left.get(i), right.get(j)) {
                (Some(l), Some(r)) => match l.name().cmp(r.name()) {
                    std::cmp::Ordering::Less => {
                        i += 1;
                        (Some(l), None)
                    }
                    std::cmp::Ordering::Greater => {
                        j += 1;
                        (None, Some(r))
                    }
                    std::cmp::Ordering::Equal => {
                        i += 1;
                        j += 1;
                        (Some(l), Some(r))
                    }
                },
                (Some(l), None) => {
                    i += 1;
                    (Some(l), None)
                }
                (None, Some(r)) => {
                    j += 1;
                    (None, Some(r))
                }
                (None, None) => break,
            };
            self.compare_nodes(l, r, left_parent, right_parent)?;
        }
        Ok(())
    }

    fn compare_nodes(
        &mut self,
        left: Option<&Node>,
        right: Option<&Node>,
        left_parent: Option<&NodeRef>,
        right_parent: Option<&NodeRef>,
    ) -> DiffResult<()> {
        if let (Some(l), Some(r)) = (left, right) {
            if l == r {
                return Ok(());
            }
            if l.kind() != r.kind() {
                // A feature replaced by a tree (or the reverse) is a removal
                // followed by an addition.
                self.compare_nodes(Some(l), None, left_parent, right_parent)?;
                if !self.stopped {
                    self.compare_nodes(None, Some(r), left_parent, right_parent)?;
                }
                return Ok(());
            }
        }

        let left = child_ref(left_parent, left);
        let right = child_ref(right_parent, right);
        let kind = match left.as_ref().or(right.as_ref()) {
            Some(node) => node.kind(),
            None => return Ok(()),
        };

        match kind {
            NodeKind::Feature => {
                if self.walk.verify {
                    self.verify_feature(left.as_ref(), Side::Left)?;
                    self.verify_feature(right.as_ref(), Side::Right)?;
                }
                if !self.consumer.feature(left.as_ref(), right.as_ref()) {
                    debug!("tree diff stopped by consumer");
                    self.stopped = true;
                }
            }
            NodeKind::Tree => {
                if self.consumer.tree(left.as_ref(), right.as_ref()) {
                    let l = self.subtree_level(left.as_ref(), Side::Left)?;
                    let r = self.subtree_level(right.as_ref(), Side::Right)?;
                    self.compare(l, r, left.as_ref(), right.as_ref(), 0)?;
                }
                self.consumer.end_tree(left.as_ref(), right.as_ref());
            }
        }
        Ok(())
    }

    fn subtree_level(&self, node: Option<&NodeRef>, side: Side) -> DiffResult<Level> {
        match node {
            Some(node) => {
                let tree = self.load_tree(side, node.object_id(), node.path())?;
                Ok(Level::of(&tree))
            }
            None => Ok(Level::Entries(Vec::new())),
        }
    }

    fn load_tree(&self, side: Side, id: ObjectId, path: String) -> DiffResult<RevTree> {
        let store = self.store(side);
        if !self.walk.verify {
            return Ok(store.get_tree(&id)?);
        }
        match store.get_if_present(&id)? {
            Some(obj) => Ok(obj.into_tree()?),
            None => {
                warn!(id = %id.short_hex(), path = %path, ?side, "tree missing from store");
                Err(DiffError::MissingObject { id, path })
            }
        }
    }

    fn verify_feature(&self, node: Option<&NodeRef>, side: Side) -> DiffResult<()> {
        let Some(node) = node else {
            return Ok(());
        };
        let id = node.object_id();
        if self.store(side).exists(&id)? {
            return Ok(());
        }
        let path = node.path();
        warn!(id = %id.short_hex(), path = %path, ?side, "feature missing from store");
        Err(DiffError::MissingObject { id, path })
    }
}

fn child_ref(parent: Option<&NodeRef>, node: Option<&Node>) -> Option<NodeRef> {
    let node = node?.clone();
    Some(match parent {
        Some(parent) => NodeRef::child_of(parent, node),
        None => NodeRef::new("", node, None),
    })
}
