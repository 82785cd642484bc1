use geovc_crypto::ContentHasher;
use geovc_types::{Envelope, FieldType, FieldValue, ObjectId};
use serde::{Deserialize, Serialize};

/// A feature: an ordered list of typed attribute values.
///
/// The meaning of each position is given by the feature's [`RevFeatureType`].
#[derive(Clone, Debug, PartialEq)]
pub struct RevFeature {
    id: ObjectId,
    values: Vec<FieldValue>,
}

impl RevFeature {
    pub fn new(values: Vec<FieldValue>) -> Self {
        let mut sink = ContentHasher::FEATURE.start();
        sink.put_u32(values.len() as u32);
        for value in &values {
            sink.put_value(value);
        }
        Self {
            id: sink.finish(),
            values,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&FieldValue> {
        self.values.get(index)
    }

    /// Union of the envelopes of all geometry values.
    pub fn bounds(&self) -> Option<Envelope> {
        Envelope::union_of(self.values.iter().map(FieldValue::envelope))
    }
}

/// One attribute of a feature type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub binding: FieldType,
    pub nillable: bool,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, binding: FieldType, nillable: bool) -> Self {
        Self {
            name: name.into(),
            binding,
            nillable,
        }
    }
}

/// The schema shared by the features of a tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevFeatureType {
    id: ObjectId,
    name: String,
    properties: Vec<PropertyDescriptor>,
}

impl RevFeatureType {
    pub fn new(name: impl Into<String>, properties: Vec<PropertyDescriptor>) -> Self {
        let name = name.into();
        let mut sink = ContentHasher::FEATURE_TYPE.start();
        sink.put_str(&name).put_u32(properties.len() as u32);
        for p in &properties {
            sink.put_str(&p.name)
                .put_u8(p.binding.tag())
                .put_bool(p.nillable);
        }
        Self {
            id: sink.finish(),
            name,
            properties,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    /// Position of the property called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }

    /// Returns `true` if `feature` has one value per property, each matching the
    /// declared binding or null where allowed.
    pub fn conforms(&self, feature: &RevFeature) -> bool {
        feature.values().len() == self.properties.len()
            && self
                .properties
                .iter()
                .zip(feature.values())
                .all(|(p, v)| match v {
                    FieldValue::Null => p.nillable,
                    v => v.field_type() == p.binding,
                })
    }
}
