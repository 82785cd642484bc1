use std::collections::BTreeMap;

use tracing::debug;

use super::node::Node;
use super::tree::{RevTree, Slot};
use crate::error::StoreResult;

/// Encode `target` as a delta against `original`.
///
/// Each target entry equal to the entry with the same name (nodes) or index
/// (buckets) in `original` becomes a placeholder; the rest stay literal. The
/// result has the same id as `target`.
pub fn encode_delta(original: &RevTree, target: &RevTree) -> StoreResult<RevTree> {
    let trees = target
        .trees()
        .map(|node| node_slot(node, original.tree_position(node.name()), |i| original.tree_at(i)))
        .collect::<Vec<_>>();
    let features = target
        .features()
        .map(|node| {
            node_slot(node, original.feature_position(node.name()), |i| {
                original.feature_at(i)
            })
        })
        .collect::<Vec<_>>();
    let buckets = target
        .buckets()
        .map(|bucket| {
            let slot = match original.bucket(bucket.index()) {
                Some(prev) if prev == bucket => Slot::Placeholder(bucket.index() as usize),
                _ => Slot::Literal(bucket.clone()),
            };
            (bucket.index(), slot)
        })
        .collect::<BTreeMap<_, _>>();

    let delta = RevTree::delta(
        target.id(),
        target.size(),
        target.num_trees(),
        original.clone(),
        trees,
        features,
        buckets,
    )?;
    debug!(
        tree = %target.id().short_hex(),
        original = %original.id().short_hex(),
        level = delta.delta_level(),
        "encoded delta tree"
    );
    Ok(delta)
}

fn node_slot<'a>(
    node: &Node,
    position: Option<usize>,
    at: impl Fn(usize) -> Option<&'a Node>,
) -> Slot<Node> {
    match position {
        Some(i) if at(i) == Some(node) => Slot::Placeholder(i),
        _ => Slot::Literal(node.clone()),
    }
}

/// Fraction of `target`'s entries and buckets that are unchanged in
/// `original`; `0.0` for an empty target.
pub fn reuse_ratio(original: &RevTree, target: &RevTree) -> f64 {
    let total = target.tree_count() + target.feature_count() + target.bucket_count();
    if total == 0 {
        return 0.0;
    }
    let same = |a: Option<&Node>, b: &Node| a == Some(b);
    let reused = target
        .trees()
        .filter(|n| same(original.find(n.name()), *n))
        .count()
        + target
            .features()
            .filter(|n| same(original.find(n.name()), *n))
            .count()
        + target
            .buckets()
            .filter(|b| original.bucket(b.index()) == Some(*b))
            .count();
    reused as f64 / total as f64
}
