//! Core reference types.
//!
//! A ref is a name that points either straight at an object id or at
//! another ref. Names are hierarchical, `/`-separated paths such as
//! `refs/heads/master`; a few well-known top-level names (`HEAD`,
//! `WORK_HEAD`, `STAGE_HEAD`) sit outside the `refs/` namespace.

use std::fmt;

use geovc_types::ObjectId;
use serde::{Deserialize, Serialize};

/// The current branch, usually symbolic.
pub const HEAD: &str = "HEAD";
/// Root tree of the working tree.
pub const WORK_HEAD: &str = "WORK_HEAD";
/// Root tree of the staging area.
pub const STAGE_HEAD: &str = "STAGE_HEAD";

pub const REFS_PREFIX: &str = "refs/";
pub const HEADS_PREFIX: &str = "refs/heads/";
pub const TAGS_PREFIX: &str = "refs/tags/";
pub const REMOTES_PREFIX: &str = "refs/remotes/";

/// Default branch.
pub const MASTER: &str = "refs/heads/master";

/// Full name of the branch `name`.
pub fn branch_ref(name: &str) -> String {
    format!("{HEADS_PREFIX}{name}")
}

/// Full name of the tag `name`.
pub fn tag_ref(name: &str) -> String {
    format!("{TAGS_PREFIX}{name}")
}

/// Full name of `branch` on `remote`.
pub fn remote_ref(remote: &str, branch: &str) -> String {
    format!("{REMOTES_PREFIX}{remote}/{branch}")
}

/// A named reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ref {
    /// Points at an object.
    Direct { name: String, target: ObjectId },
    /// Points at another ref by name.
    Symbolic { name: String, target: String },
}

impl Ref {
    pub fn direct(name: impl Into<String>, target: ObjectId) -> Self {
        Ref::Direct {
            name: name.into(),
            target,
        }
    }

    pub fn symbolic(name: impl Into<String>, target: impl Into<String>) -> Self {
        Ref::Symbolic {
            name: name.into(),
            target: target.into(),
        }
    }

    /// The full name of this ref.
    pub fn name(&self) -> &str {
        match self {
            Ref::Direct { name, .. } | Ref::Symbolic { name, .. } => name,
        }
    }

    /// The name without its namespace prefix (`refs/heads/x` -> `x`).
    pub fn short_name(&self) -> &str {
        let name = self.name();
        [HEADS_PREFIX, TAGS_PREFIX, REMOTES_PREFIX, REFS_PREFIX]
            .iter()
            .find_map(|prefix| name.strip_prefix(prefix))
            .unwrap_or(name)
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, Ref::Symbolic { .. })
    }

    pub fn is_branch(&self) -> bool {
        self.name().starts_with(HEADS_PREFIX)
    }

    pub fn is_tag(&self) -> bool {
        self.name().starts_with(TAGS_PREFIX)
    }

    pub fn is_remote(&self) -> bool {
        self.name().starts_with(REMOTES_PREFIX)
    }

    /// The object id of a direct ref.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Ref::Direct { target, .. } => Some(*target),
            Ref::Symbolic { .. } => None,
        }
    }

    /// The ref name a symbolic ref points at.
    pub fn symbolic_target(&self) -> Option<&str> {
        match self {
            Ref::Symbolic { target, .. } => Some(target),
            Ref::Direct { .. } => None,
        }
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ref::Direct { name, target } => write!(f, "{name} -> {target}"),
            Ref::Symbolic { name, target } => write!(f, "{name} -> ref: {target}"),
        }
    }
}
