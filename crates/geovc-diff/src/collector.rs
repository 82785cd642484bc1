use std::fmt;

use geovc_store::{ObjectStore, RevTree, TreeConfig};
use geovc_types::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::DiffResult;
use crate::node_ref::{NodeRef, PATH_SEPARATOR};
use crate::pre_order::{PreOrderConsumer, PreOrderDiffWalk};

/// How an entry changed between the two sides of a diff.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "A"),
            Self::Removed => write!(f, "D"),
            Self::Modified => write!(f, "M"),
        }
    }
}

/// One changed entry. At least one side is always present.
#[derive(Clone, Debug, PartialEq)]
pub struct DiffEntry {
    pub left: Option<NodeRef>,
    pub right: Option<NodeRef>,
}

impl DiffEntry {
    pub fn change_type(&self) -> ChangeType {
        match (&self.left, &self.right) {
            (None, _) => ChangeType::Added,
            (_, None) => ChangeType::Removed,
            _ => ChangeType::Modified,
        }
    }

    /// Path of the entry, taken from the new side when there is one.
    pub fn path(&self) -> String {
        self.right
            .as_ref()
            .or(self.left.as_ref())
            .map(NodeRef::path)
            .unwrap_or_default()
    }

    pub fn old_object_id(&self) -> Option<ObjectId> {
        self.left.as_ref().map(NodeRef::object_id)
    }

    pub fn new_object_id(&self) -> Option<ObjectId> {
        self.right.as_ref().map(NodeRef::object_id)
    }
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.change_type(), self.path())
    }
}

/// Gathers changed features, and optionally changed subtrees, into a list.
#[derive(Debug, Default)]
pub struct ChangeCollector {
    entries: Vec<DiffEntry>,
    path_filter: Option<String>,
    report_trees: bool,
    limit: Option<usize>,
}

impl ChangeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only report entries at or below `path`. Subtrees outside it are not
    /// descended into.
    pub fn with_path_filter(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = path.trim_matches(PATH_SEPARATOR).to_string();
        self.path_filter = (!path.is_empty()).then_some(path);
        self
    }

    /// Also report subtrees that were added, removed or modified.
    pub fn with_trees(mut self, report_trees: bool) -> Self {
        self.report_trees = report_trees;
        self
    }

    /// Stop the walk once `limit` entries have been collected.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn entries(&self) -> &[DiffEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<DiffEntry> {
        self.entries
    }

    fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.entries.len() >= limit)
    }

    /// `path` is the filter or lies below it.
    fn selects(&self, path: &str) -> bool {
        match &self.path_filter {
            None => true,
            Some(filter) => is_within(path, filter),
        }
    }

    /// `path` is an ancestor of the filter, so its contents may match.
    fn leads_to_filter(&self, path: &str) -> bool {
        match &self.path_filter {
            None => true,
            Some(filter) => is_within(filter, path),
        }
    }

    fn push(&mut self, left: Option<&NodeRef>, right: Option<&NodeRef>) {
        self.entries.push(DiffEntry {
            left: left.cloned(),
            right: right.cloned(),
        });
    }
}

fn is_within(path: &str, ancestor: &str) -> bool {
    path == ancestor
        || (path.starts_with(ancestor)
            && path[ancestor.len()..].starts_with(PATH_SEPARATOR))
}

impl PreOrderConsumer for ChangeCollector {
    fn tree(&mut self, left: Option<&NodeRef>, right: Option<&NodeRef>) -> bool {
        let Some(node) = left.or(right) else {
            return false;
        };
        if node.is_root() {
            return true;
        }
        if self.is_full() {
            return false;
        }
        let path = node.path();
        if self.selects(&path) {
            if self.report_trees {
                self.push(left, right);
            }
            true
        } else {
            self.leads_to_filter(&path)
        }
    }

    fn feature(&mut self, left: Option<&NodeRef>, right: Option<&NodeRef>) -> bool {
        let Some(node) = left.or(right) else {
            return true;
        };
        if self.selects(&node.path()) {
            self.push(left, right);
        }
        !self.is_full()
    }
}

/// Every feature that differs between `left` and `right`.
pub fn diff_trees(
    left: &RevTree,
    right: &RevTree,
    store: &dyn ObjectStore,
    config: &TreeConfig,
) -> DiffResult<Vec<DiffEntry>> {
    let mut collector = ChangeCollector::new();
    PreOrderDiffWalk::new(left.clone(), right.clone(), store, store)
        .with_tree_config(config)
        .walk(&mut collector)?;
    Ok(collector.into_entries())
}
