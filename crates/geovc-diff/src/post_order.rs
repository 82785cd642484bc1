//! Post-order dual-tree walk.
//!
//! Children are reported before the subtree or bucket that contains them,
//! which is the order needed to collect the objects a change touches: by the
//! time a tree is reported, everything under it already has been.

use std::collections::BTreeSet;

use geovc_store::{Bucket, ObjectStore, RevTree, TreeConfig};
use geovc_types::ObjectId;

use crate::error::DiffResult;
use crate::node_ref::{BucketIndex, NodeRef};
use crate::pre_order::{PreOrderConsumer, PreOrderDiffWalk};

/// Receives the differences found by a [`PostOrderDiffWalk`].
///
/// The root trees themselves are not reported.
pub trait PostOrderConsumer {
    fn feature(&mut self, left: Option<&NodeRef>, right: Option<&NodeRef>);

    fn tree(&mut self, _left: Option<&NodeRef>, _right: Option<&NodeRef>) {}

    fn bucket(
        &mut self,
        _left_parent: Option<&NodeRef>,
        _right_parent: Option<&NodeRef>,
        _index: &BucketIndex,
        _left: Option<&Bucket>,
        _right: Option<&Bucket>,
    ) {
    }

    fn complete(&mut self) {}
}

/// Compares two trees, reporting contents before containers.
pub struct PostOrderDiffWalk<'a> {
    inner: PreOrderDiffWalk<'a>,
}

impl<'a> PostOrderDiffWalk<'a> {
    pub fn new(
        left: RevTree,
        right: RevTree,
        left_store: &'a dyn ObjectStore,
        right_store: &'a dyn ObjectStore,
    ) -> Self {
        Self {
            inner: PreOrderDiffWalk::new(left, right, left_store, right_store),
        }
    }

    pub fn with_tree_config(mut self, config: &TreeConfig) -> Self {
        self.inner = self.inner.with_tree_config(config);
        self
    }

    pub fn verify(mut self, verify: bool) -> Self {
        self.inner = self.inner.verify(verify);
        self
    }

    pub fn walk<C: PostOrderConsumer + ?Sized>(&self, consumer: &mut C) -> DiffResult<()> {
        self.inner.walk(&mut Deferred { consumer })
    }
}

/// Turns pre-order callbacks into post-order ones by reporting containers on
/// their `end_*` callback.
struct Deferred<'c, C: ?Sized> {
    consumer: &'c mut C,
}

impl<C: PostOrderConsumer + ?Sized> PreOrderConsumer for Deferred<'_, C> {
    fn end_tree(&mut self, left: Option<&NodeRef>, right: Option<&NodeRef>) {
        let is_root = left.or(right).is_some_and(NodeRef::is_root);
        if !is_root {
            self.consumer.tree(left, right);
        }
    }

    fn end_bucket(
        &mut self,
        left_parent: Option<&NodeRef>,
        right_parent: Option<&NodeRef>,
        index: &BucketIndex,
        left: Option<&Bucket>,
        right: Option<&Bucket>,
    ) {
        self.consumer
            .bucket(left_parent, right_parent, index, left, right);
    }

    fn feature(&mut self, left: Option<&NodeRef>, right: Option<&NodeRef>) -> bool {
        self.consumer.feature(left, right);
        true
    }

    fn complete(&mut self) {
        self.consumer.complete();
    }
}

/// Collects the ids of objects present on the right side of a diff but not
/// on the left: the new features, subtrees and bucket shards.
///
/// The root trees are never reported by the walk, so the id of the right
/// root is not collected; callers packing a revision add it themselves.
#[derive(Debug, Default)]
pub struct ObjectIdCollector {
    ids: BTreeSet<ObjectId>,
}

impl ObjectIdCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &BTreeSet<ObjectId> {
        &self.ids
    }

    pub fn into_ids(self) -> BTreeSet<ObjectId> {
        self.ids
    }

    fn add(&mut self, left: Option<ObjectId>, right: Option<ObjectId>) {
        if let Some(right) = right {
            if left != Some(right) {
                self.ids.insert(right);
            }
        }
    }
}

impl PostOrderConsumer for ObjectIdCollector {
    fn feature(&mut self, left: Option<&NodeRef>, right: Option<&NodeRef>) {
        self.add(left.map(NodeRef::object_id), right.map(NodeRef::object_id));
    }

    fn tree(&mut self, left: Option<&NodeRef>, right: Option<&NodeRef>) {
        self.add(left.map(NodeRef::object_id), right.map(NodeRef::object_id));
    }

    fn bucket(
        &mut self,
        _left_parent: Option<&NodeRef>,
        _right_parent: Option<&NodeRef>,
        _index: &BucketIndex,
        left: Option<&Bucket>,
        right: Option<&Bucket>,
    ) {
        self.add(left.map(Bucket::object_id), right.map(Bucket::object_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geovc_store::{build_tree, InMemoryObjectStore, Node};

    fn oid(n: u8) -> ObjectId {
        ObjectId::from_raw([n; 20])
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    fn path(node: Option<&NodeRef>) -> String {
        node.map(NodeRef::path).unwrap_or_else(|| "-".to_string())
    }

    impl PostOrderConsumer for Recorder {
        fn feature(&mut self, left: Option<&NodeRef>, right: Option<&NodeRef>) {
            self.events
                .push(format!("feature {} {}", path(left), path(right)));
        }

        fn tree(&mut self, left: Option<&NodeRef>, right: Option<&NodeRef>) {
            self.events
                .push(format!("tree {} {}", path(left), path(right)));
        }

        fn bucket(
            &mut self,
            _lp: Option<&NodeRef>,
            _rp: Option<&NodeRef>,
            index: &BucketIndex,
            _left: Option<&Bucket>,
            _right: Option<&Bucket>,
        ) {
            self.events.push(format!("bucket {}", index.index));
        }

        fn complete(&mut self) {
            self.events.push("complete".to_string());
        }
    }

    #[test]
    fn single_change_has_no_container_callbacks() {
        let store = InMemoryObjectStore::new();
        let config = TreeConfig::default();
        let a = build_tree(
            &store,
            &config,
            vec![Node::feature("f1", oid(1)), Node::feature("f2", oid(2))],
        )
        .unwrap();
        let b = build_tree(
            &store,
            &config,
            vec![Node::feature("f1", oid(1)), Node::feature("f2", oid(3))],
        )
        .unwrap();

        let mut rec = Recorder::default();
        PostOrderDiffWalk::new(a, b, &store, &store)
            .walk(&mut rec)
            .unwrap();
        assert_eq!(rec.events, vec!["feature f2 f2", "complete"]);
    }

    #[test]
    fn contents_come_before_their_tree() {
        let store = InMemoryObjectStore::new();
        let config = TreeConfig::default();
        let sub = build_tree(
            &store,
            &config,
            vec![Node::feature("a", oid(1)), Node::feature("b", oid(2))],
        )
        .unwrap();
        let root = build_tree(&store, &config, vec![Node::tree("layer", sub.id())]).unwrap();

        let mut rec = Recorder::default();
        PostOrderDiffWalk::new(RevTree::empty(), root, &store, &store)
            .walk(&mut rec)
            .unwrap();
        assert_eq!(
            rec.events,
            vec![
                "feature - layer/a",
                "feature - layer/b",
                "tree - layer",
                "complete",
            ]
        );
    }

    #[test]
    fn buckets_follow_their_entries() {
        let store = InMemoryObjectStore::new();
        let config = TreeConfig::with_fan_out(4);
        let nodes: Vec<Node> = (0..12u8)
            .map(|i| Node::feature(format!("f{i:02}"), oid(i + 1)))
            .collect();
        let tree = build_tree(&store, &config, nodes).unwrap();
        assert!(tree.is_sharded());

        let mut rec = Recorder::default();
        PostOrderDiffWalk::new(RevTree::empty(), tree, &store, &store)
            .with_tree_config(&config)
            .walk(&mut rec)
            .unwrap();
        let last_feature = rec
            .events
            .iter()
            .rposition(|e| e.starts_with("feature"))
            .unwrap();
        let last_bucket = rec
            .events
            .iter()
            .rposition(|e| e.starts_with("bucket"))
            .unwrap();
        assert!(last_feature < last_bucket);
        assert_eq!(
            rec.events.iter().filter(|e| e.starts_with("feature")).count(),
            12
        );
    }

    #[test]
    fn collects_new_object_ids() {
        let store = InMemoryObjectStore::new();
        let config = TreeConfig::default();
        let sub_a = build_tree(&store, &config, vec![Node::feature("a", oid(1))]).unwrap();
        let sub_b = build_tree(
            &store,
            &config,
            vec![Node::feature("a", oid(1)), Node::feature("b", oid(2))],
        )
        .unwrap();
        let left = build_tree(&store, &config, vec![Node::tree("layer", sub_a.id())]).unwrap();
        let right = build_tree(
            &store,
            &config,
            vec![
                Node::tree("layer", sub_b.id()),
                Node::feature("top", oid(3)),
            ],
        )
        .unwrap();

        let mut ids = ObjectIdCollector::new();
        PostOrderDiffWalk::new(left, right.clone(), &store, &store)
            .walk(&mut ids)
            .unwrap();
        assert!(!ids.ids().contains(&right.id()));
        let expected: BTreeSet<ObjectId> = [oid(2), oid(3), sub_b.id()].into_iter().collect();
        assert_eq!(ids.into_ids(), expected);
    }
}
