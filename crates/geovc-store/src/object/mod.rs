//! Immutable revision objects.
//!
//! Every object's id is the hash of its canonical encoding, computed once at
//! construction. Objects are never mutated; changing anything produces a new
//! object with a new id.

mod commit;
mod delta;
mod feature;
mod node;
mod tag;
mod tree;

use std::fmt;

use geovc_types::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

pub use commit::{Person, RevCommit};
pub use delta::{encode_delta, reuse_ratio};
pub use feature::{PropertyDescriptor, RevFeature, RevFeatureType};
pub use node::{Bucket, Node, NodeKind};
pub use tag::RevTag;
pub use tree::{empty_tree_id, hash_tree, RevTree, Slot};

/// The type tag of a revision object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RevObjectType {
    Commit,
    Tree,
    Feature,
    FeatureType,
    Tag,
}

impl RevObjectType {
    /// Leading type byte of an encoded object.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Commit => 0,
            Self::Tree => 1,
            Self::Feature => 2,
            Self::Tag => 3,
            Self::FeatureType => 4,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Commit),
            1 => Some(Self::Tree),
            2 => Some(Self::Feature),
            3 => Some(Self::Tag),
            4 => Some(Self::FeatureType),
            _ => None,
        }
    }
}

impl fmt::Display for RevObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commit => write!(f, "commit"),
            Self::Tree => write!(f, "tree"),
            Self::Feature => write!(f, "feature"),
            Self::FeatureType => write!(f, "featuretype"),
            Self::Tag => write!(f, "tag"),
        }
    }
}

/// Any revision object.
#[derive(Clone, Debug, PartialEq)]
pub enum RevObject {
    Commit(RevCommit),
    Tree(RevTree),
    Feature(RevFeature),
    FeatureType(RevFeatureType),
    Tag(RevTag),
}

impl RevObject {
    pub fn id(&self) -> ObjectId {
        match self {
            Self::Commit(c) => c.id(),
            Self::Tree(t) => t.id(),
            Self::Feature(f) => f.id(),
            Self::FeatureType(ft) => ft.id(),
            Self::Tag(t) => t.id(),
        }
    }

    pub fn object_type(&self) -> RevObjectType {
        match self {
            Self::Commit(_) => RevObjectType::Commit,
            Self::Tree(_) => RevObjectType::Tree,
            Self::Feature(_) => RevObjectType::Feature,
            Self::FeatureType(_) => RevObjectType::FeatureType,
            Self::Tag(_) => RevObjectType::Tag,
        }
    }

    /// Fail with [`StoreError::WrongType`] unless this object has type `expected`.
    pub fn expect_type(self, expected: RevObjectType) -> StoreResult<Self> {
        if self.object_type() == expected {
            Ok(self)
        } else {
            Err(self.wrong_type(expected))
        }
    }

    fn wrong_type(&self, expected: RevObjectType) -> StoreError {
        StoreError::WrongType {
            id: self.id(),
            expected,
            actual: self.object_type(),
        }
    }

    pub fn as_tree(&self) -> Option<&RevTree> {
        match self {
            Self::Tree(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_commit(&self) -> Option<&RevCommit> {
        match self {
            Self::Commit(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_tree(self) -> StoreResult<RevTree> {
        match self {
            Self::Tree(t) => Ok(t),
            other => Err(other.wrong_type(RevObjectType::Tree)),
        }
    }

    pub fn into_commit(self) -> StoreResult<RevCommit> {
        match self {
            Self::Commit(c) => Ok(c),
            other => Err(other.wrong_type(RevObjectType::Commit)),
        }
    }

    pub fn into_feature(self) -> StoreResult<RevFeature> {
        match self {
            Self::Feature(f) => Ok(f),
            other => Err(other.wrong_type(RevObjectType::Feature)),
        }
    }

    pub fn into_feature_type(self) -> StoreResult<RevFeatureType> {
        match self {
            Self::FeatureType(ft) => Ok(ft),
            other => Err(other.wrong_type(RevObjectType::FeatureType)),
        }
    }

    pub fn into_tag(self) -> StoreResult<RevTag> {
        match self {
            Self::Tag(t) => Ok(t),
            other => Err(other.wrong_type(RevObjectType::Tag)),
        }
    }
}

impl From<RevCommit> for RevObject {
    fn from(v: RevCommit) -> Self {
        Self::Commit(v)
    }
}

impl From<RevTree> for RevObject {
    fn from(v: RevTree) -> Self {
        Self::Tree(v)
    }
}

impl From<RevFeature> for RevObject {
    fn from(v: RevFeature) -> Self {
        Self::Feature(v)
    }
}

impl From<RevFeatureType> for RevObject {
    fn from(v: RevFeatureType) -> Self {
        Self::FeatureType(v)
    }
}

impl From<RevTag> for RevObject {
    fn from(v: RevTag) -> Self {
        Self::Tag(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geovc_types::FieldValue;

    #[test]
    fn type_tag_roundtrip() {
        for ty in [
            RevObjectType::Commit,
            RevObjectType::Tree,
            RevObjectType::Feature,
            RevObjectType::FeatureType,
            RevObjectType::Tag,
        ] {
            assert_eq!(RevObjectType::from_tag(ty.tag()), Some(ty));
        }
        assert_eq!(RevObjectType::from_tag(9), None);
        assert_eq!(RevObjectType::Tree.tag(), 1);
    }

    #[test]
    fn object_type_display() {
        assert_eq!(RevObjectType::Commit.to_string(), "commit");
        assert_eq!(RevObjectType::FeatureType.to_string(), "featuretype");
    }

    #[test]
    fn expect_type_mismatch() {
        let feature = RevObject::from(RevFeature::new(vec![FieldValue::Long(1)]));
        let id = feature.id();
        let err = feature.into_tree().unwrap_err();
        match err {
            StoreError::WrongType {
                id: got,
                expected,
                actual,
            } => {
                assert_eq!(got, id);
                assert_eq!(expected, RevObjectType::Tree);
                assert_eq!(actual, RevObjectType::Feature);
            }
            other => panic!("expected WrongType, got {other:?}"),
        }
    }

    #[test]
    fn into_variant_succeeds_for_matching_type() {
        let tree = RevObject::from(RevTree::empty());
        assert_eq!(tree.object_type(), RevObjectType::Tree);
        assert!(tree.as_tree().is_some());
        assert!(tree.as_commit().is_none());
        assert_eq!(tree.into_tree().unwrap().id(), empty_tree_id());
    }
}
