use geovc_crypto::ContentHasher;
use geovc_types::ObjectId;

use super::commit::Person;

/// An annotated tag pointing at a commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevTag {
    id: ObjectId,
    name: String,
    commit_id: ObjectId,
    message: String,
    tagger: Person,
}

impl RevTag {
    pub fn new(
        name: impl Into<String>,
        commit_id: ObjectId,
        message: impl Into<String>,
        tagger: Person,
    ) -> Self {
        let name = name.into();
        let message = message.into();
        let mut sink = ContentHasher::TAG.start();
        sink.put_str(&name).put_id(&commit_id).put_str(&message);
        tagger.hash_into(&mut sink);
        Self {
            id: sink.finish(),
            name,
            commit_id,
            message,
            tagger,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commit_id(&self) -> ObjectId {
        self.commit_id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tagger(&self) -> &Person {
        &self.tagger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_identity() {
        let tagger = Person::new("Bo", "bo@example.com", 5);
        let a = RevTag::new("v1.0", ObjectId::from_raw([1; 20]), "release", tagger.clone());
        let b = RevTag::new("v1.1", ObjectId::from_raw([1; 20]), "release", tagger);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.name(), "v1.0");
        assert_eq!(a.commit_id(), ObjectId::from_raw([1; 20]));
    }
}
