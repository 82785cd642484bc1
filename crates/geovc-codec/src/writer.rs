use std::io::Write;

use geovc_store::{
    Bucket, Node, Person, RevCommit, RevFeature, RevFeatureType, RevObject, RevObjectType, RevTag,
    RevTree, Slot,
};
use geovc_types::{Envelope, FieldValue, ObjectId};

use crate::error::CodecResult;
use crate::format::{FormatVersion, LITERAL, PLACEHOLDER};
use crate::varint::encode_varint;

/// Encodes revision objects in one [`FormatVersion`].
#[derive(Clone, Copy, Debug)]
pub struct ObjectWriter {
    version: FormatVersion,
}

impl ObjectWriter {
    pub fn new(version: FormatVersion) -> Self {
        Self { version }
    }

    pub fn version(&self) -> FormatVersion {
        self.version
    }

    /// Encode `object` into a new buffer.
    pub fn encode(&self, object: &RevObject) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf, object);
        buf
    }

    /// Encode `object` and write it to `out`.
    pub fn write<W: Write>(&self, object: &RevObject, out: &mut W) -> CodecResult<()> {
        out.write_all(&self.encode(object))?;
        Ok(())
    }

    /// Append the encoding of `object` to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>, object: &RevObject) {
        buf.push(object.object_type().tag());
        match object {
            RevObject::Commit(c) => put_commit(buf, c),
            RevObject::Tree(t) => self.put_tree(buf, t),
            RevObject::Feature(f) => put_feature(buf, f),
            RevObject::FeatureType(ft) => put_feature_type(buf, ft),
            RevObject::Tag(t) => put_tag(buf, t),
        }
    }

    /// Encode a tree, including its leading type tag.
    pub fn encode_tree(&self, tree: &RevTree) -> Vec<u8> {
        let mut buf = vec![RevObjectType::Tree.tag()];
        self.put_tree(&mut buf, tree);
        buf
    }

    fn put_tree(&self, buf: &mut Vec<u8>, tree: &RevTree) {
        encode_varint(buf, tree.size());
        encode_varint(buf, u64::from(tree.num_trees()));

        match self.version {
            FormatVersion::V1 => {
                put_list(buf, tree.feature_count(), tree.features(), put_node);
                put_list(buf, tree.tree_count(), tree.trees(), put_node);
                put_list(buf, tree.bucket_count(), tree.buckets(), |buf, b| {
                    encode_varint(buf, u64::from(b.index()));
                    put_bucket_body(buf, b);
                });
            }
            FormatVersion::V2 => {
                match tree.original() {
                    Some(original) => {
                        encode_varint(buf, u64::from(tree.delta_level()));
                        buf.extend_from_slice(original.id().as_bytes());
                    }
                    None => encode_varint(buf, 0),
                }
                put_list(buf, tree.feature_count(), tree.feature_slots(), put_node_slot);
                put_list(buf, tree.tree_count(), tree.tree_slots(), put_node_slot);
                put_list(buf, tree.bucket_count(), tree.bucket_slots(), |buf, (index, slot)| {
                    encode_varint(buf, u64::from(*index));
                    match slot {
                        Slot::Literal(b) => {
                            buf.push(LITERAL);
                            put_bucket_body(buf, b);
                        }
                        Slot::Placeholder(_) => buf.push(PLACEHOLDER),
                    }
                });
            }
        }
    }
}

impl Default for ObjectWriter {
    fn default() -> Self {
        Self::new(FormatVersion::LATEST)
    }
}

fn put_list<I, T, F>(buf: &mut Vec<u8>, len: usize, items: I, mut put: F)
where
    I: IntoIterator<Item = T>,
    F: FnMut(&mut Vec<u8>, T),
{
    encode_varint(buf, len as u64);
    for item in items {
        put(buf, item);
    }
}

fn put_node_slot(buf: &mut Vec<u8>, slot: &Slot<Node>) {
    match slot {
        Slot::Literal(node) => {
            buf.push(LITERAL);
            put_node(buf, node);
        }
        Slot::Placeholder(index) => {
            buf.push(PLACEHOLDER);
            encode_varint(buf, *index as u64);
        }
    }
}

fn put_node(buf: &mut Vec<u8>, node: &Node) {
    put_str(buf, node.name());
    buf.extend_from_slice(node.object_id().as_bytes());
    put_opt_id(buf, node.metadata_id().as_ref());
    put_opt_envelope(buf, node.bounds());
    encode_varint(buf, node.extra_data().len() as u64);
    for (key, value) in node.extra_data() {
        put_str(buf, key);
        put_value(buf, value);
    }
}

fn put_bucket_body(buf: &mut Vec<u8>, bucket: &Bucket) {
    buf.extend_from_slice(bucket.object_id().as_bytes());
    put_opt_envelope(buf, bucket.bounds());
}

fn put_commit(buf: &mut Vec<u8>, commit: &RevCommit) {
    buf.extend_from_slice(commit.tree_id().as_bytes());
    encode_varint(buf, commit.parents().len() as u64);
    for parent in commit.parents() {
        buf.extend_from_slice(parent.as_bytes());
    }
    put_person(buf, commit.author());
    put_person(buf, commit.committer());
    put_str(buf, commit.message());
}

fn put_feature(buf: &mut Vec<u8>, feature: &RevFeature) {
    encode_varint(buf, feature.values().len() as u64);
    for value in feature.values() {
        put_value(buf, value);
    }
}

fn put_feature_type(buf: &mut Vec<u8>, ft: &RevFeatureType) {
    put_str(buf, ft.name());
    encode_varint(buf, ft.properties().len() as u64);
    for p in ft.properties() {
        put_str(buf, &p.name);
        buf.push(p.binding.tag());
        buf.push(u8::from(p.nillable));
    }
}

fn put_tag(buf: &mut Vec<u8>, tag: &RevTag) {
    put_str(buf, tag.name());
    buf.extend_from_slice(tag.commit_id().as_bytes());
    put_str(buf, tag.message());
    put_person(buf, tag.tagger());
}

fn put_person(buf: &mut Vec<u8>, person: &Person) {
    put_opt_str(buf, person.name.as_deref());
    put_opt_str(buf, person.email.as_deref());
    buf.extend_from_slice(&person.timestamp.to_be_bytes());
    buf.extend_from_slice(&person.tz_offset.to_be_bytes());
}

pub(crate) fn put_value(buf: &mut Vec<u8>, value: &FieldValue) {
    buf.push(value.field_type().tag());
    match value {
        FieldValue::Null => {}
        FieldValue::Boolean(v) => buf.push(u8::from(*v)),
        FieldValue::Integer(v) => buf.extend_from_slice(&v.to_be_bytes()),
        FieldValue::Long(v) => buf.extend_from_slice(&v.to_be_bytes()),
        FieldValue::Double(v) => buf.extend_from_slice(&v.to_be_bytes()),
        FieldValue::String(v) => put_str(buf, v),
        FieldValue::Bytes(v) => put_bytes(buf, v),
        FieldValue::Geometry(g) => {
            put_bytes(buf, &g.wkb);
            put_envelope(buf, &g.envelope);
        }
    }
}

fn put_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    encode_varint(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_bytes(buf, s.as_bytes());
}

fn put_opt_str(buf: &mut Vec<u8>, s: Option<&str>) {
    match s {
        Some(s) => {
            buf.push(1);
            put_str(buf, s);
        }
        None => buf.push(0),
    }
}

fn put_opt_id(buf: &mut Vec<u8>, id: Option<&ObjectId>) {
    match id {
        Some(id) => {
            buf.push(1);
            buf.extend_from_slice(id.as_bytes());
        }
        None => buf.push(0),
    }
}

fn put_envelope(buf: &mut Vec<u8>, env: &Envelope) {
    for v in [env.min_x, env.min_y, env.max_x, env.max_y] {
        buf.extend_from_slice(&v.to_be_bytes());
    }
}

fn put_opt_envelope(buf: &mut Vec<u8>, env: Option<&Envelope>) {
    match env {
        Some(env) => {
            buf.push(1);
            put_envelope(buf, env);
        }
        None => buf.push(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geovc_store::encode_delta;

    fn oid(b: u8) -> ObjectId {
        ObjectId::from_raw([b; 20])
    }

    #[test]
    fn empty_tree_layout() {
        let v1 = ObjectWriter::new(FormatVersion::V1).encode_tree(&RevTree::empty());
        assert_eq!(v1, [1, 0, 0, 0, 0, 0]);
        let v2 = ObjectWriter::new(FormatVersion::V2).encode_tree(&RevTree::empty());
        assert_eq!(v2, [1, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn v2_feature_node_layout() {
        let tree = RevTree::from_features(vec![Node::feature("a", oid(7))]).unwrap();
        let bytes = ObjectWriter::new(FormatVersion::V2).encode_tree(&tree);
        let mut expected = vec![1, 1, 0, 0, 1, LITERAL, 1, b'a'];
        expected.extend_from_slice(&[7; 20]);
        expected.extend_from_slice(&[0, 0, 0, 0, 0]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn v2_writes_placeholders_and_v1_materializes() {
        let original = RevTree::from_features(vec![
            Node::feature("a", oid(1)),
            Node::feature("b", oid(2)),
        ])
        .unwrap();
        let target = RevTree::from_features(vec![
            Node::feature("a", oid(1)),
            Node::feature("b", oid(3)),
        ])
        .unwrap();
        let delta = encode_delta(&original, &target).unwrap();

        let v2 = ObjectWriter::new(FormatVersion::V2).encode_tree(&delta);
        assert_eq!(&v2[..4], &[1, 2, 0, 1]);
        assert_eq!(&v2[4..24], original.id().as_bytes());
        assert_eq!(&v2[24..27], &[2, PLACEHOLDER, 0]);

        let v1 = ObjectWriter::new(FormatVersion::V1);
        assert_eq!(v1.encode_tree(&delta), v1.encode_tree(&target));
    }

    #[test]
    fn value_layouts() {
        let mut buf = Vec::new();
        put_value(&mut buf, &FieldValue::Integer(-1));
        put_value(&mut buf, &FieldValue::Boolean(true));
        put_value(&mut buf, &FieldValue::Null);
        assert_eq!(buf, [2, 0xFF, 0xFF, 0xFF, 0xFF, 1, 1, 0]);
    }

    #[test]
    fn write_to_io() {
        let mut out = Vec::new();
        let obj = RevObject::from(RevFeature::new(vec![FieldValue::Long(5)]));
        ObjectWriter::default().write(&obj, &mut out).unwrap();
        assert_eq!(out[0], RevObjectType::Feature.tag());
        assert_eq!(out, ObjectWriter::default().encode(&obj));
    }
}
