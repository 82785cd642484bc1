use std::collections::{HashSet, VecDeque};

use geovc_types::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::GraphResult;

/// Which edges of a commit to list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// From the commit to its parents.
    Out,
    /// From the commit's children to it.
    In,
    Both,
}

/// A parent link: `from` is the child commit, `to` its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: ObjectId,
    pub to: ObjectId,
}

impl GraphEdge {
    pub fn new(from: ObjectId, to: ObjectId) -> Self {
        Self { from, to }
    }
}

/// Index from commit ids to their parents, with the reverse child links.
///
/// Only commits that were `put` exist in the graph. A parent that was never
/// recorded itself (for example the boundary of a shallow history) still
/// appears in its children's parent lists and has children of its own, but
/// `exists` reports `false` for it and it is never an orphan.
pub trait GraphDatabase: Send + Sync {
    fn exists(&self, commit: &ObjectId) -> GraphResult<bool>;

    /// Record `commit` with its parents in order. Returns `true` if the
    /// commit was not already recorded.
    fn put(&self, commit: &ObjectId, parents: &[ObjectId]) -> GraphResult<bool>;

    /// Forget `commit` and its parent links. Links from its children to it
    /// are kept. Returns `true` if it was recorded.
    fn remove(&self, commit: &ObjectId) -> GraphResult<bool>;

    /// Parents in recorded order; empty for roots and unknown commits.
    fn parents(&self, commit: &ObjectId) -> GraphResult<Vec<ObjectId>>;

    /// Children in insertion order.
    fn children(&self, commit: &ObjectId) -> GraphResult<Vec<ObjectId>>;

    /// Number of recorded commits.
    fn len(&self) -> GraphResult<usize>;

    fn is_empty(&self) -> GraphResult<bool> {
        Ok(self.len()? == 0)
    }

    fn edges(&self, commit: &ObjectId, direction: Direction) -> GraphResult<Vec<GraphEdge>> {
        let mut edges = Vec::new();
        if matches!(direction, Direction::Out | Direction::Both) {
            for parent in self.parents(commit)? {
                edges.push(GraphEdge::new(*commit, parent));
            }
        }
        if matches!(direction, Direction::In | Direction::Both) {
            for child in self.children(commit)? {
                edges.push(GraphEdge::new(child, *commit));
            }
        }
        Ok(edges)
    }

    /// Every commit reachable through parent links, nearest first. The
    /// starting commit is not included.
    fn ancestors(&self, commit: &ObjectId) -> GraphResult<Vec<ObjectId>> {
        let mut visited = HashSet::from([*commit]);
        let mut queue: VecDeque<ObjectId> = self.parents(commit)?.into();
        let mut result = Vec::new();
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            result.push(current);
            queue.extend(self.parents(&current)?);
        }
        Ok(result)
    }

    /// `true` if `ancestor` is reachable from `commit` through parent links.
    fn is_ancestor(&self, ancestor: &ObjectId, commit: &ObjectId) -> GraphResult<bool> {
        Ok(self.ancestors(commit)?.contains(ancestor))
    }

    /// Root commits reachable from `tips`, in the order they are found.
    ///
    /// Depth-first; commits shared by several tips are visited once.
    fn find_orphans(&self, tips: &[ObjectId]) -> GraphResult<Vec<ObjectId>> {
        let mut visited = HashSet::new();
        let mut stack: Vec<ObjectId> = tips.iter().rev().copied().collect();
        let mut orphans = Vec::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let parents = self.parents(&current)?;
            if parents.is_empty() {
                if self.exists(&current)? {
                    orphans.push(current);
                }
                continue;
            }
            stack.extend(parents.into_iter().rev());
        }
        Ok(orphans)
    }

    /// Length of the shortest parent path from `commit` to a root. A root has
    /// depth 0; `None` if `commit` is not recorded or reaches no recorded
    /// root.
    fn depth(&self, commit: &ObjectId) -> GraphResult<Option<usize>> {
        if !self.exists(commit)? {
            return Ok(None);
        }
        let mut visited = HashSet::from([*commit]);
        let mut queue = VecDeque::from([(*commit, 0usize)]);
        while let Some((current, depth)) = queue.pop_front() {
            let parents = self.parents(&current)?;
            if parents.is_empty() && self.exists(&current)? {
                return Ok(Some(depth));
            }
            for parent in parents {
                if visited.insert(parent) {
                    queue.push_back((parent, depth + 1));
                }
            }
        }
        Ok(None)
    }
}
