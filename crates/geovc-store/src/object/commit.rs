use geovc_crypto::{ContentHasher, HashSink};
use geovc_types::ObjectId;
use serde::{Deserialize, Serialize};

/// Author, committer or tagger identity plus a timestamp.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Person {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Offset from UTC in milliseconds.
    pub tz_offset: i32,
}

impl Person {
    pub fn new(name: impl Into<String>, email: impl Into<String>, timestamp: i64) -> Self {
        Self {
            name: Some(name.into()),
            email: Some(email.into()),
            timestamp,
            tz_offset: 0,
        }
    }

    pub(crate) fn hash_into(&self, sink: &mut HashSink) {
        sink.put_opt_str(self.name.as_deref())
            .put_opt_str(self.email.as_deref())
            .put_i64(self.timestamp)
            .put_u32(self.tz_offset as u32);
    }
}

/// A commit: a root tree, its parent commits, and authorship.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevCommit {
    id: ObjectId,
    tree_id: ObjectId,
    parents: Vec<ObjectId>,
    author: Person,
    committer: Person,
    message: String,
}

impl RevCommit {
    pub fn new(
        tree_id: ObjectId,
        parents: Vec<ObjectId>,
        author: Person,
        committer: Person,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        let mut sink = ContentHasher::COMMIT.start();
        sink.put_id(&tree_id).put_u32(parents.len() as u32);
        for parent in &parents {
            sink.put_id(parent);
        }
        author.hash_into(&mut sink);
        committer.hash_into(&mut sink);
        sink.put_str(&message);

        Self {
            id: sink.finish(),
            tree_id,
            parents,
            author,
            committer,
            message,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn tree_id(&self) -> ObjectId {
        self.tree_id
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    /// First parent, if any.
    pub fn parent(&self) -> Option<ObjectId> {
        self.parents.first().copied()
    }

    /// A commit without parents starts a history.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn author(&self) -> &Person {
        &self.author
    }

    pub fn committer(&self) -> &Person {
        &self.committer
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Person {
        Person::new("Ada", "ada@example.com", 1_700_000_000_000)
    }

    fn oid(b: u8) -> ObjectId {
        ObjectId::from_raw([b; 20])
    }

    #[test]
    fn id_is_deterministic() {
        let a = RevCommit::new(oid(1), vec![oid(2)], person(), person(), "msg");
        let b = RevCommit::new(oid(1), vec![oid(2)], person(), person(), "msg");
        assert_eq!(a.id(), b.id());
        assert_eq!(a, b);
    }

    #[test]
    fn every_field_affects_id() {
        let base = RevCommit::new(oid(1), vec![oid(2)], person(), person(), "msg");
        let other_tree = RevCommit::new(oid(9), vec![oid(2)], person(), person(), "msg");
        let other_parents = RevCommit::new(oid(1), vec![], person(), person(), "msg");
        let other_msg = RevCommit::new(oid(1), vec![oid(2)], person(), person(), "other");
        let mut later = person();
        later.timestamp += 1;
        let other_author = RevCommit::new(oid(1), vec![oid(2)], later, person(), "msg");
        for c in [other_tree, other_parents, other_msg, other_author] {
            assert_ne!(c.id(), base.id());
        }
    }

    #[test]
    fn parent_order_matters() {
        let a = RevCommit::new(oid(1), vec![oid(2), oid(3)], person(), person(), "m");
        let b = RevCommit::new(oid(1), vec![oid(3), oid(2)], person(), person(), "m");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.parent(), Some(oid(2)));
    }

    #[test]
    fn root_commit() {
        let c = RevCommit::new(oid(1), vec![], person(), person(), "initial");
        assert!(c.is_root());
        assert_eq!(c.parent(), None);
        assert_eq!(c.message(), "initial");
    }
}
