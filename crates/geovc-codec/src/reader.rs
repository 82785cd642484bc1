use std::collections::{BTreeMap, HashMap};

use geovc_store::{
    Bucket, Node, NodeKind, ObjectStore, Person, PropertyDescriptor, RevCommit, RevFeature,
    RevFeatureType, RevObject, RevObjectType, RevTag, RevTree, Slot,
};
use geovc_types::{Envelope, FieldType, FieldValue, Geometry, ObjectId, NUM_BYTES};
use tracing::debug;

use crate::error::{CodecError, CodecResult};
use crate::format::{FormatVersion, LITERAL, PLACEHOLDER};
use crate::varint::decode_varint;

/// Cursor over encoded bytes.
pub(crate) struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn corrupt(&self, reason: impl Into<String>) -> CodecError {
        CodecError::Corrupt {
            offset: self.pos,
            reason: reason.into(),
        }
    }

    pub(crate) fn bytes(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(self.corrupt(format!("need {n} bytes, {} left", self.remaining())));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> CodecResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn bool(&mut self) -> CodecResult<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(self.corrupt(format!("invalid boolean byte {other}"))),
        }
    }

    fn varint(&mut self) -> CodecResult<u64> {
        let (value, used) = decode_varint(&self.data[self.pos..], self.pos)?;
        self.pos += used;
        Ok(value)
    }

    fn varint_u32(&mut self) -> CodecResult<u32> {
        let v = self.varint()?;
        u32::try_from(v).map_err(|_| self.corrupt(format!("value {v} exceeds u32")))
    }

    /// A count or length, bounded by the bytes left so a corrupt length
    /// cannot trigger a huge allocation.
    fn len(&mut self) -> CodecResult<usize> {
        let v = self.varint()?;
        match usize::try_from(v) {
            Ok(n) if n <= self.remaining() => Ok(n),
            _ => Err(self.corrupt(format!("length {v} exceeds remaining data"))),
        }
    }

    pub(crate) fn id(&mut self) -> CodecResult<ObjectId> {
        Ok(ObjectId::from_raw(self.array::<NUM_BYTES>()?))
    }

    fn opt_id(&mut self) -> CodecResult<Option<ObjectId>> {
        Ok(if self.bool()? { Some(self.id()?) } else { None })
    }

    fn byte_vec(&mut self) -> CodecResult<Vec<u8>> {
        let n = self.len()?;
        Ok(self.bytes(n)?.to_vec())
    }

    fn string(&mut self) -> CodecResult<String> {
        let start = self.pos;
        String::from_utf8(self.byte_vec()?).map_err(|e| CodecError::Corrupt {
            offset: start,
            reason: format!("invalid utf-8: {e}"),
        })
    }

    fn opt_string(&mut self) -> CodecResult<Option<String>> {
        Ok(if self.bool()? { Some(self.string()?) } else { None })
    }

    fn f64(&mut self) -> CodecResult<f64> {
        Ok(f64::from_be_bytes(self.array()?))
    }

    fn envelope(&mut self) -> CodecResult<Envelope> {
        Ok(Envelope {
            min_x: self.f64()?,
            min_y: self.f64()?,
            max_x: self.f64()?,
            max_y: self.f64()?,
        })
    }

    fn opt_envelope(&mut self) -> CodecResult<Option<Envelope>> {
        Ok(if self.bool()? { Some(self.envelope()?) } else { None })
    }

    fn value(&mut self) -> CodecResult<FieldValue> {
        let tag = self.u8()?;
        let ty = FieldType::from_tag(tag).map_err(|e| self.corrupt(e.to_string()))?;
        Ok(match ty {
            FieldType::Null => FieldValue::Null,
            FieldType::Boolean => FieldValue::Boolean(self.bool()?),
            FieldType::Integer => FieldValue::Integer(i32::from_be_bytes(self.array()?)),
            FieldType::Long => FieldValue::Long(i64::from_be_bytes(self.array()?)),
            FieldType::Double => FieldValue::Double(self.f64()?),
            FieldType::String => FieldValue::String(self.string()?),
            FieldType::Bytes => FieldValue::Bytes(self.byte_vec()?),
            FieldType::Geometry => {
                let wkb = self.byte_vec()?;
                FieldValue::Geometry(Geometry::new(wkb, self.envelope()?))
            }
        })
    }

    fn person(&mut self) -> CodecResult<Person> {
        Ok(Person {
            name: self.opt_string()?,
            email: self.opt_string()?,
            timestamp: i64::from_be_bytes(self.array()?),
            tz_offset: i32::from_be_bytes(self.array()?),
        })
    }

    fn node(&mut self, kind: NodeKind) -> CodecResult<Node> {
        let name = self.string()?;
        let mut node = Node::new(name, kind, self.id()?);
        if let Some(md) = self.opt_id()? {
            node = node.with_metadata(md);
        }
        if let Some(bounds) = self.opt_envelope()? {
            node = node.with_bounds(bounds);
        }
        for _ in 0..self.len()? {
            let key = self.string()?;
            node = node.with_extra(key, self.value()?);
        }
        Ok(node)
    }

    fn bucket_body(&mut self, index: u32) -> CodecResult<Bucket> {
        let id = self.id()?;
        Ok(Bucket::new(index, id, self.opt_envelope()?))
    }
}

/// Decodes revision objects written in one [`FormatVersion`].
///
/// Decoding a delta tree needs the original tree, which is fetched from the
/// store given to [`with_store`](Self::with_store).
#[derive(Clone, Copy)]
pub struct ObjectReader<'s> {
    version: FormatVersion,
    store: Option<&'s dyn ObjectStore>,
}

impl<'s> ObjectReader<'s> {
    pub fn new(version: FormatVersion) -> Self {
        Self {
            version,
            store: None,
        }
    }

    pub fn with_store(mut self, store: &'s dyn ObjectStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn version(&self) -> FormatVersion {
        self.version
    }

    /// Decode the object with id `id` from exactly `bytes`.
    ///
    /// The decoded object must hash to `id`.
    pub fn read(&self, id: ObjectId, bytes: &[u8]) -> CodecResult<RevObject> {
        let mut dec = Decoder::new(bytes);
        let object = self.read_from(&mut dec, id, &HashMap::new())?;
        if dec.remaining() > 0 {
            return Err(dec.corrupt(format!("{} trailing bytes", dec.remaining())));
        }
        Ok(object)
    }

    /// Decode a tree, rejecting any other object type.
    pub fn read_tree(&self, id: ObjectId, bytes: &[u8]) -> CodecResult<RevTree> {
        let actual = bytes.first().copied().unwrap_or(u8::MAX);
        let expected = RevObjectType::Tree.tag();
        if actual != expected {
            return Err(CodecError::UnexpectedType { expected, actual });
        }
        match self.read(id, bytes)? {
            RevObject::Tree(tree) => Ok(tree),
            other => Err(CodecError::UnexpectedType {
                expected,
                actual: other.object_type().tag(),
            }),
        }
    }

    /// Decode one object at the decoder's position. `local` holds trees that
    /// may serve as delta originals before the store is consulted.
    pub(crate) fn read_from(
        &self,
        dec: &mut Decoder<'_>,
        id: ObjectId,
        local: &HashMap<ObjectId, RevTree>,
    ) -> CodecResult<RevObject> {
        let tag = dec.u8()?;
        let ty = RevObjectType::from_tag(tag).ok_or(CodecError::UnknownType(tag))?;
        let object: RevObject = match ty {
            RevObjectType::Commit => read_commit(dec)?.into(),
            RevObjectType::Tree => self.read_tree_body(dec, id, local)?.into(),
            RevObjectType::Feature => read_feature(dec)?.into(),
            RevObjectType::FeatureType => read_feature_type(dec)?.into(),
            RevObjectType::Tag => read_tag(dec)?.into(),
        };
        if object.id() != id {
            return Err(CodecError::HashMismatch {
                expected: id,
                computed: object.id(),
            });
        }
        Ok(object)
    }

    fn read_tree_body(
        &self,
        dec: &mut Decoder<'_>,
        id: ObjectId,
        local: &HashMap<ObjectId, RevTree>,
    ) -> CodecResult<RevTree> {
        let size = dec.varint()?;
        let num_trees = dec.varint_u32()?;

        let original_id = match self.version {
            FormatVersion::V1 => None,
            FormatVersion::V2 => match dec.varint()? {
                0 => None,
                _level => Some(dec.id()?),
            },
        };

        let Some(original_id) = original_id else {
            let features = read_list(dec, |d| self.literal_node(d, NodeKind::Feature))?;
            let trees = read_list(dec, |d| self.literal_node(d, NodeKind::Tree))?;
            let mut buckets: BTreeMap<u32, Bucket> = BTreeMap::new();
            for _ in 0..dec.len()? {
                let index = dec.varint_u32()?;
                let bucket = match self.version {
                    FormatVersion::V1 => dec.bucket_body(index)?,
                    FormatVersion::V2 => match dec.u8()? {
                        LITERAL => dec.bucket_body(index)?,
                        other => {
                            return Err(dec.corrupt(format!(
                                "bucket discriminator {other:#04x} in a literal tree"
                            )))
                        }
                    },
                };
                if buckets.insert(index, bucket).is_some() {
                    return Err(CodecError::DuplicateBucket(index));
                }
            }
            let tree = RevTree::new(
                size,
                num_trees,
                trees,
                features,
                buckets.into_values().collect(),
            )
            .map_err(|e| dec.corrupt(e.to_string()))?;
            return Ok(tree);
        };

        let original = self.resolve_original(original_id, local)?;
        let features = read_list(dec, |d| read_node_slot(d, NodeKind::Feature))?;
        let trees = read_list(dec, |d| read_node_slot(d, NodeKind::Tree))?;
        let mut buckets = BTreeMap::new();
        for _ in 0..dec.len()? {
            let index = dec.varint_u32()?;
            let slot = match dec.u8()? {
                LITERAL => Slot::Literal(dec.bucket_body(index)?),
                PLACEHOLDER => Slot::Placeholder(index as usize),
                other => return Err(dec.corrupt(format!("invalid bucket discriminator {other}"))),
            };
            if buckets.insert(index, slot).is_some() {
                return Err(CodecError::DuplicateBucket(index));
            }
        }
        let tree = RevTree::delta(id, size, num_trees, original, trees, features, buckets)?;
        debug!(tree = %id.short_hex(), level = tree.delta_level(), "decoded delta tree");
        Ok(tree)
    }

    fn literal_node(&self, dec: &mut Decoder<'_>, kind: NodeKind) -> CodecResult<Node> {
        if self.version.supports_delta() {
            match dec.u8()? {
                LITERAL => {}
                other => {
                    return Err(dec.corrupt(format!(
                        "node discriminator {other:#04x} in a literal tree"
                    )))
                }
            }
        }
        dec.node(kind)
    }

    fn resolve_original(
        &self,
        id: ObjectId,
        local: &HashMap<ObjectId, RevTree>,
    ) -> CodecResult<RevTree> {
        if let Some(tree) = local.get(&id) {
            return Ok(tree.clone());
        }
        let store = self.store.ok_or(CodecError::StoreRequired(id))?;
        Ok(store.get_tree(&id)?)
    }
}

fn read_list<T>(
    dec: &mut Decoder<'_>,
    mut item: impl FnMut(&mut Decoder<'_>) -> CodecResult<T>,
) -> CodecResult<Vec<T>> {
    let n = dec.len()?;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(item(dec)?);
    }
    Ok(out)
}

fn read_node_slot(dec: &mut Decoder<'_>, kind: NodeKind) -> CodecResult<Slot<Node>> {
    match dec.u8()? {
        LITERAL => Ok(Slot::Literal(dec.node(kind)?)),
        PLACEHOLDER => {
            let index = dec.varint()?;
            let index =
                usize::try_from(index).map_err(|_| dec.corrupt("placeholder index overflow"))?;
            Ok(Slot::Placeholder(index))
        }
        other => Err(dec.corrupt(format!("invalid node discriminator {other}"))),
    }
}

fn read_commit(dec: &mut Decoder<'_>) -> CodecResult<RevCommit> {
    let tree_id = dec.id()?;
    let parents = read_list(dec, |d| d.id())?;
    let author = dec.person()?;
    let committer = dec.person()?;
    let message = dec.string()?;
    Ok(RevCommit::new(tree_id, parents, author, committer, message))
}

fn read_feature(dec: &mut Decoder<'_>) -> CodecResult<RevFeature> {
    Ok(RevFeature::new(read_list(dec, |d| d.value())?))
}

fn read_feature_type(dec: &mut Decoder<'_>) -> CodecResult<RevFeatureType> {
    let name = dec.string()?;
    let properties = read_list(dec, |d| {
        let name = d.string()?;
        let tag = d.u8()?;
        let binding = FieldType::from_tag(tag).map_err(|e| d.corrupt(e.to_string()))?;
        Ok(PropertyDescriptor::new(name, binding, d.bool()?))
    })?;
    Ok(RevFeatureType::new(name, properties))
}

fn read_tag(dec: &mut Decoder<'_>) -> CodecResult<RevTag> {
    let name = dec.string()?;
    let commit_id = dec.id()?;
    let message = dec.string()?;
    Ok(RevTag::new(name, commit_id, message, dec.person()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::ObjectWriter;
    use geovc_store::{encode_delta, InMemoryObjectStore, StoreError};
    use proptest::prelude::*;

    fn oid(b: u8) -> ObjectId {
        ObjectId::from_raw([b; 20])
    }

    fn roundtrip(object: &RevObject, version: FormatVersion) -> RevObject {
        let bytes = ObjectWriter::new(version).encode(object);
        ObjectReader::new(version).read(object.id(), &bytes).unwrap()
    }

    fn rich_tree() -> RevTree {
        RevTree::new(
            12,
            3,
            vec![Node::tree("layer", oid(1))
                .with_metadata(oid(2))
                .with_bounds(Envelope::new(0.0, 0.0, 10.0, 10.0))],
            vec![
                Node::feature("f1", oid(3)).with_extra("note", FieldValue::from("x")),
                Node::feature("f2", oid(4)).with_bounds(Envelope::point(-1.5, 2.25)),
            ],
            vec![],
        )
        .unwrap()
    }

    fn sharded_tree() -> RevTree {
        RevTree::from_buckets(
            100,
            0,
            vec![
                Bucket::new(0, oid(5), Some(Envelope::point(1.0, 1.0))),
                Bucket::new(17, oid(6), None),
            ],
        )
        .unwrap()
    }

    // -----------------------------------------------------------------------
    // Round trips
    // -----------------------------------------------------------------------

    #[test]
    fn every_object_type_roundtrips() {
        let who = Person {
            name: Some("Ada".into()),
            email: None,
            timestamp: -5,
            tz_offset: 3_600_000,
        };
        let objects: Vec<RevObject> = vec![
            RevCommit::new(oid(1), vec![oid(2), oid(3)], who.clone(), who.clone(), "msg").into(),
            RevFeature::new(vec![
                FieldValue::Null,
                FieldValue::Boolean(false),
                FieldValue::Integer(i32::MIN),
                FieldValue::Long(i64::MAX),
                FieldValue::Double(-0.5),
                FieldValue::from("héllo"),
                FieldValue::Bytes(vec![0, 255]),
                FieldValue::Geometry(Geometry::new(vec![1, 2, 3], Envelope::point(4.0, 5.0))),
            ])
            .into(),
            RevFeatureType::new(
                "roads",
                vec![
                    PropertyDescriptor::new("geom", FieldType::Geometry, false),
                    PropertyDescriptor::new("name", FieldType::String, true),
                ],
            )
            .into(),
            RevTag::new("v1", oid(9), "release", who).into(),
            rich_tree().into(),
            sharded_tree().into(),
            RevTree::empty().into(),
        ];
        for version in [FormatVersion::V1, FormatVersion::V2] {
            for object in &objects {
                assert_eq!(&roundtrip(object, version), object, "{version}");
            }
        }
    }

    #[test]
    fn delta_tree_roundtrips_with_store() {
        let store = InMemoryObjectStore::new();
        let original = sharded_tree();
        store.put(&original.clone().into()).unwrap();
        let target = RevTree::from_buckets(
            101,
            0,
            vec![
                Bucket::new(0, oid(5), Some(Envelope::point(1.0, 1.0))),
                Bucket::new(17, oid(7), None),
            ],
        )
        .unwrap();
        let delta = encode_delta(&original, &target).unwrap();

        let bytes = ObjectWriter::new(FormatVersion::V2).encode_tree(&delta);
        let reader = ObjectReader::new(FormatVersion::V2).with_store(&store);
        let decoded = reader.read_tree(delta.id(), &bytes).unwrap();
        assert!(decoded.is_delta());
        assert_eq!(decoded, target);
        assert_eq!(decoded.bucket_slots()[&0], Slot::Placeholder(0));
        assert_eq!(decoded.bucket(17).map(Bucket::object_id), Some(oid(7)));
    }

    #[test]
    fn delta_node_placeholders_roundtrip() {
        let store = InMemoryObjectStore::new();
        let original = rich_tree();
        store.put(&original.clone().into()).unwrap();
        let target = RevTree::new(
            12,
            3,
            original.trees().cloned().collect(),
            vec![
                original.feature_at(0).unwrap().clone(),
                Node::feature("f2", oid(8)),
                Node::feature("f3", oid(9)),
            ],
            vec![],
        )
        .unwrap();
        let delta = encode_delta(&original, &target).unwrap();
        let bytes = ObjectWriter::new(FormatVersion::V2).encode_tree(&delta);
        let decoded = ObjectReader::new(FormatVersion::V2)
            .with_store(&store)
            .read_tree(target.id(), &bytes)
            .unwrap();
        assert_eq!(decoded.tree_slots()[0], Slot::Placeholder(0));
        assert_eq!(decoded.feature_slots()[0], Slot::Placeholder(0));
        let names: Vec<_> = decoded.features().map(|n| n.name().to_string()).collect();
        assert_eq!(names, ["f1", "f2", "f3"]);
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[test]
    fn delta_without_store_or_original_fails() {
        let original = sharded_tree();
        let kept = Bucket::new(0, oid(5), Some(Envelope::point(1.0, 1.0)));
        let target = RevTree::from_buckets(1, 0, vec![kept]).unwrap();
        let delta = encode_delta(&original, &target).unwrap();
        let bytes = ObjectWriter::new(FormatVersion::V2).encode_tree(&delta);

        let err = ObjectReader::new(FormatVersion::V2)
            .read(delta.id(), &bytes)
            .unwrap_err();
        assert!(matches!(err, CodecError::StoreRequired(id) if id == original.id()));

        let empty = InMemoryObjectStore::new();
        let err = ObjectReader::new(FormatVersion::V2)
            .with_store(&empty)
            .read(delta.id(), &bytes)
            .unwrap_err();
        assert!(matches!(err, CodecError::Store(StoreError::NotFound(_))));
    }

    #[test]
    fn delta_with_wrong_id_is_fatal() {
        let store = InMemoryObjectStore::new();
        let original = sharded_tree();
        store.put(&original.clone().into()).unwrap();
        let delta = encode_delta(&original, &rich_tree()).unwrap();
        let bytes = ObjectWriter::new(FormatVersion::V2).encode_tree(&delta);
        let err = ObjectReader::new(FormatVersion::V2)
            .with_store(&store)
            .read(oid(1), &bytes)
            .unwrap_err();
        assert!(matches!(
            err,
            CodecError::Store(StoreError::DeltaHashMismatch { .. })
        ));
    }

    #[test]
    fn read_tree_rejects_other_types() {
        let feature = RevObject::from(RevFeature::new(vec![]));
        let bytes = ObjectWriter::default().encode(&feature);
        let err = ObjectReader::new(FormatVersion::V2)
            .read_tree(feature.id(), &bytes)
            .unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnexpectedType {
                expected: 1,
                actual: 2
            }
        ));
    }

    #[test]
    fn duplicate_bucket_index_is_corrupt() {
        let mut bytes = vec![RevObjectType::Tree.tag(), 0, 0, 0, 0, 2];
        for _ in 0..2 {
            bytes.push(4);
            bytes.extend_from_slice(&[1; 20]);
            bytes.push(0);
        }
        let err = ObjectReader::new(FormatVersion::V1)
            .read(oid(0), &bytes)
            .unwrap_err();
        assert!(matches!(err, CodecError::DuplicateBucket(4)));
    }

    #[test]
    fn hash_mismatch_and_trailing_bytes() {
        let tree = rich_tree();
        let mut bytes = ObjectWriter::new(FormatVersion::V1).encode_tree(&tree);
        let reader = ObjectReader::new(FormatVersion::V1);
        assert!(matches!(
            reader.read(oid(1), &bytes),
            Err(CodecError::HashMismatch { .. })
        ));
        bytes.push(0);
        assert!(matches!(
            reader.read(tree.id(), &bytes),
            Err(CodecError::Corrupt { .. })
        ));
    }

    #[test]
    fn truncated_input_is_corrupt() {
        let bytes = ObjectWriter::default().encode_tree(&rich_tree());
        for cut in [1, 5, bytes.len() / 2, bytes.len() - 1] {
            assert!(matches!(
                ObjectReader::new(FormatVersion::V2).read(rich_tree().id(), &bytes[..cut]),
                Err(CodecError::Corrupt { .. })
            ));
        }
    }

    #[test]
    fn v1_reader_rejects_v2_discriminators() {
        let bytes = ObjectWriter::new(FormatVersion::V2).encode_tree(&rich_tree());
        assert!(ObjectReader::new(FormatVersion::V1)
            .read(rich_tree().id(), &bytes)
            .is_err());
    }

    #[test]
    fn unknown_type_tag() {
        assert!(matches!(
            ObjectReader::new(FormatVersion::V1).read(oid(0), &[9]),
            Err(CodecError::UnknownType(9))
        ));
    }

    proptest! {
        #[test]
        fn feature_trees_roundtrip(
            entries in proptest::collection::btree_map("[a-z0-9]{1,8}", any::<[u8; 20]>(), 0..30),
            v2 in any::<bool>(),
        ) {
            let nodes = entries
                .into_iter()
                .map(|(name, raw)| Node::feature(name, ObjectId::from_raw(raw)))
                .collect();
            let tree = RevTree::from_features(nodes).unwrap();
            let version = if v2 { FormatVersion::V2 } else { FormatVersion::V1 };
            let bytes = ObjectWriter::new(version).encode_tree(&tree);
            let decoded = ObjectReader::new(version).read_tree(tree.id(), &bytes).unwrap();
            prop_assert_eq!(decoded, tree);
        }
    }
}
