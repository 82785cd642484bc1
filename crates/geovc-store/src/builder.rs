//! Sharded tree construction.
//!
//! Trees are built bottom-up: shard trees are stored first and their parents
//! refer to them by id only.

use std::collections::BTreeMap;

use geovc_crypto::ContentHasher;
use tracing::debug;

use crate::config::TreeConfig;
use crate::error::{StoreError, StoreResult};
use crate::object::{encode_delta, reuse_ratio, Bucket, Node, RevObject, RevTree};
use crate::traits::ObjectStore;

/// Bucket that entry `name` falls into at `depth`.
pub fn bucket_of(name: &str, depth: usize, bucket_count: u32) -> u32 {
    let hash = ContentHasher::raw_hash(name.as_bytes());
    u32::from(hash[depth % hash.len()]) % bucket_count.max(1)
}

/// Accumulates the entries of a tree and builds it, sharding as needed.
///
/// A builder started from an existing tree keeps that tree as the original
/// for delta encoding of the new root.
pub struct TreeBuilder<'a> {
    store: &'a dyn ObjectStore,
    config: TreeConfig,
    entries: BTreeMap<String, Node>,
    original: Option<RevTree>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(store: &'a dyn ObjectStore, config: TreeConfig) -> Self {
        Self {
            store,
            config,
            entries: BTreeMap::new(),
            original: None,
        }
    }

    /// Start from every entry of `tree`, following its buckets through `store`.
    pub fn from_tree(
        store: &'a dyn ObjectStore,
        config: TreeConfig,
        tree: &RevTree,
    ) -> StoreResult<Self> {
        let mut builder = Self::new(store, config);
        builder.collect(tree)?;
        builder.original = Some(tree.clone());
        Ok(builder)
    }

    fn collect(&mut self, tree: &RevTree) -> StoreResult<()> {
        for node in tree.trees().chain(tree.features()) {
            self.entries.insert(node.name().to_string(), node.clone());
        }
        for bucket in tree.buckets() {
            let shard = self.store.get_tree(&bucket.object_id())?;
            self.collect(&shard)?;
        }
        Ok(())
    }

    /// Add or replace an entry, returning the one it replaced.
    pub fn put(&mut self, node: Node) -> Option<Node> {
        self.entries.insert(node.name().to_string(), node)
    }

    pub fn remove(&mut self, name: &str) -> Option<Node> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the tree, storing every shard and the root.
    ///
    /// The root is delta encoded against the starting tree when the delta
    /// settings allow it.
    pub fn build(self) -> StoreResult<RevTree> {
        let entries: Vec<Node> = self.entries.into_values().collect();
        let mut root = build_level(self.store, &self.config, entries, 0)?;

        if let Some(original) = &self.original {
            let delta = &self.config.delta;
            if delta.is_enabled()
                && original.delta_level() < delta.max_level
                && original.id() != root.id()
                && reuse_ratio(original, &root) >= delta.min_reuse_ratio
            {
                root = encode_delta(original, &root)?;
            }
        }
        self.store.put(&RevObject::Tree(root.clone()))?;
        Ok(root)
    }
}

/// Build and store a tree from `nodes`, which must have unique names.
pub fn build_tree(
    store: &dyn ObjectStore,
    config: &TreeConfig,
    nodes: Vec<Node>,
) -> StoreResult<RevTree> {
    let mut entries = BTreeMap::new();
    for node in nodes {
        let name = node.name().to_string();
        if entries.insert(name.clone(), node).is_some() {
            return Err(StoreError::InvalidArgument(format!(
                "duplicate entry name {name:?}"
            )));
        }
    }
    let tree = build_level(store, config, entries.into_values().collect(), 0)?;
    store.put(&RevObject::Tree(tree.clone()))?;
    Ok(tree)
}

/// Build one level from name-sorted, unique `entries`.
fn build_level(
    store: &dyn ObjectStore,
    config: &TreeConfig,
    entries: Vec<Node>,
    depth: usize,
) -> StoreResult<RevTree> {
    if entries.len() <= config.fan_out_threshold || depth >= config.max_depth {
        return build_leaf(store, entries);
    }

    let mut shards: BTreeMap<u32, Vec<Node>> = BTreeMap::new();
    for node in entries {
        let index = bucket_of(node.name(), depth, config.bucket_count);
        shards.entry(index).or_default().push(node);
    }
    debug!(depth, buckets = shards.len(), "sharding tree level");

    let mut size = 0u64;
    let mut num_trees = 0u32;
    let mut buckets = Vec::with_capacity(shards.len());
    for (index, shard_entries) in shards {
        let shard = build_level(store, config, shard_entries, depth + 1)?;
        store.put(&RevObject::Tree(shard.clone()))?;
        size += shard.size();
        num_trees += shard.num_trees();
        buckets.push(Bucket::new(index, shard.id(), shard.bounds()));
    }
    RevTree::from_buckets(size, num_trees, buckets)
}

fn build_leaf(store: &dyn ObjectStore, entries: Vec<Node>) -> StoreResult<RevTree> {
    let (trees, features): (Vec<Node>, Vec<Node>) = entries.into_iter().partition(Node::is_tree);
    let mut size = features.len() as u64;
    let mut num_trees = trees.len() as u32;
    for node in &trees {
        let child = store.get_tree(&node.object_id())?;
        size += child.size();
        num_trees += child.num_trees();
    }
    RevTree::new(size, num_trees, trees, features, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeltaConfig;
    use crate::memory::InMemoryObjectStore;
    use geovc_types::{Envelope, ObjectId};

    fn oid(n: u32) -> ObjectId {
        let mut raw = [0u8; 20];
        raw[..4].copy_from_slice(&n.to_be_bytes());
        raw[19] = 1;
        ObjectId::from_raw(raw)
    }

    fn features(n: u32) -> Vec<Node> {
        (0..n)
            .map(|i| {
                Node::feature(format!("f{i:05}"), oid(i))
                    .with_bounds(Envelope::point(f64::from(i), 0.0))
            })
            .collect()
    }

    #[test]
    fn bucket_of_is_stable_and_in_range() {
        for depth in 0..25 {
            let b = bucket_of("roads.1", depth, 32);
            assert!(b < 32);
            assert_eq!(b, bucket_of("roads.1", depth, 32));
        }
    }

    #[test]
    fn small_tree_keeps_direct_entries() {
        let store = InMemoryObjectStore::new();
        let tree = build_tree(&store, &TreeConfig::with_fan_out(10), features(5)).unwrap();
        assert!(!tree.is_sharded());
        assert_eq!(tree.feature_count(), 5);
        assert_eq!(tree.size(), 5);
        assert_eq!(tree.bounds(), Some(Envelope::new(0.0, 0.0, 4.0, 0.0)));
        assert!(store.exists(&tree.id()).unwrap());
    }

    #[test]
    fn large_tree_is_sharded() {
        let store = InMemoryObjectStore::new();
        let config = TreeConfig::with_fan_out(2000);
        let tree = build_tree(&store, &config, features(2050)).unwrap();
        assert!(tree.is_sharded());
        assert_eq!(tree.tree_count(), 0);
        assert_eq!(tree.feature_count(), 0);
        assert_eq!(tree.size(), 2050);
        let total: u64 = tree
            .buckets()
            .map(|b| store.get_tree(&b.object_id()).unwrap().size())
            .sum();
        assert_eq!(total, 2050);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let store = InMemoryObjectStore::new();
        let config = TreeConfig::with_fan_out(8);
        let mut reversed = features(100);
        reversed.reverse();
        let a = build_tree(&store, &config, features(100)).unwrap();
        let b = build_tree(&store, &config, reversed).unwrap();
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn nested_trees_sum_sizes() {
        let store = InMemoryObjectStore::new();
        let config = TreeConfig::with_fan_out(16);
        let child = build_tree(&store, &config, features(3)).unwrap();
        let mut nodes = features(2);
        nodes.push(Node::tree("layer", child.id()));
        let root = build_tree(&store, &config, nodes).unwrap();
        assert_eq!(root.size(), 5);
        assert_eq!(root.num_trees(), 1);
    }

    #[test]
    fn duplicate_names_rejected() {
        let store = InMemoryObjectStore::new();
        let nodes = vec![Node::feature("a", oid(1)), Node::feature("a", oid(2))];
        assert!(matches!(
            build_tree(&store, &TreeConfig::default(), nodes),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn missing_child_tree_fails() {
        let store = InMemoryObjectStore::new();
        let nodes = vec![Node::tree("ghost", oid(99))];
        assert!(matches!(
            build_tree(&store, &TreeConfig::default(), nodes),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn builder_edits_and_delta_encodes() {
        let store = InMemoryObjectStore::new();
        let config = TreeConfig::with_fan_out(64);
        let v1 = build_tree(&store, &config, features(10)).unwrap();

        let mut builder = TreeBuilder::from_tree(&store, config.clone(), &v1).unwrap();
        assert_eq!(builder.len(), 10);
        builder.put(Node::feature("f00003", oid(1000)));
        let v2 = builder.build().unwrap();

        assert!(v2.is_delta());
        assert_eq!(v2.delta_level(), 1);
        assert_eq!(v2.find("f00003").map(Node::object_id), Some(oid(1000)));
        let mut plain = features(10);
        plain[3] = Node::feature("f00003", oid(1000));
        let literal = build_tree(&store, &config, plain).unwrap();
        assert_eq!(v2.id(), literal.id());
    }

    #[test]
    fn delta_disabled_or_low_reuse_stays_literal() {
        let store = InMemoryObjectStore::new();
        let mut config = TreeConfig::with_fan_out(64);
        config.delta = DeltaConfig::disabled();
        let v1 = build_tree(&store, &config, features(4)).unwrap();
        let mut b = TreeBuilder::from_tree(&store, config.clone(), &v1).unwrap();
        b.remove("f00000");
        assert!(!b.build().unwrap().is_delta());

        config.delta = DeltaConfig::default();
        let mut b = TreeBuilder::from_tree(&store, config, &v1).unwrap();
        for i in 0..4 {
            b.put(Node::feature(format!("f{i:05}"), oid(500 + i)));
        }
        assert!(!b.build().unwrap().is_delta());
    }

    #[test]
    fn builder_reads_through_buckets() {
        let store = InMemoryObjectStore::new();
        let config = TreeConfig::with_fan_out(4);
        let tree = build_tree(&store, &config, features(40)).unwrap();
        assert!(tree.is_sharded());
        let builder = TreeBuilder::from_tree(&store, config, &tree).unwrap();
        assert_eq!(builder.len(), 40);
        assert!(builder.get("f00039").is_some());
    }
}
