//! Typed attribute values stored in features and in node extra data.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::error::TypeError;

/// Opaque geometry: well-known-binary payload plus its bounding envelope.
///
/// The engine never interprets `wkb`; only `envelope` is used for bounds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub wkb: Vec<u8>,
    pub envelope: Envelope,
}

impl Geometry {
    pub fn new(wkb: Vec<u8>, envelope: Envelope) -> Self {
        Self { wkb, envelope }
    }
}

/// The binding of a feature type property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Null,
    Boolean,
    Integer,
    Long,
    Double,
    String,
    Bytes,
    Geometry,
}

impl FieldType {
    /// Stable tag byte used by both the hasher and the binary codec.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Boolean => 1,
            Self::Integer => 2,
            Self::Long => 3,
            Self::Double => 4,
            Self::String => 5,
            Self::Bytes => 6,
            Self::Geometry => 7,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, TypeError> {
        match tag {
            0 => Ok(Self::Null),
            1 => Ok(Self::Boolean),
            2 => Ok(Self::Integer),
            3 => Ok(Self::Long),
            4 => Ok(Self::Double),
            5 => Ok(Self::String),
            6 => Ok(Self::Bytes),
            7 => Ok(Self::Geometry),
            other => Err(TypeError::UnknownFieldType(other)),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Double => "double",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Geometry => "geometry",
        };
        f.write_str(name)
    }
}

/// A single typed value.
///
/// Doubles compare by bit pattern, matching how they are hashed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Geometry(Geometry),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Null => FieldType::Null,
            Self::Boolean(_) => FieldType::Boolean,
            Self::Integer(_) => FieldType::Integer,
            Self::Long(_) => FieldType::Long,
            Self::Double(_) => FieldType::Double,
            Self::String(_) => FieldType::String,
            Self::Bytes(_) => FieldType::Bytes,
            Self::Geometry(_) => FieldType::Geometry,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Envelope of a geometry value, `None` for every other kind.
    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Self::Geometry(g) if !g.envelope.is_empty() => Some(&g.envelope),
            _ => None,
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Geometry(a), Self::Geometry(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        Self::Integer(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Geometry> for FieldValue {
    fn from(v: Geometry) -> Self {
        Self::Geometry(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_roundtrip() {
        for ty in [
            FieldType::Null,
            FieldType::Boolean,
            FieldType::Integer,
            FieldType::Long,
            FieldType::Double,
            FieldType::String,
            FieldType::Bytes,
            FieldType::Geometry,
        ] {
            assert_eq!(FieldType::from_tag(ty.tag()).unwrap(), ty);
        }
        assert_eq!(
            FieldType::from_tag(42),
            Err(TypeError::UnknownFieldType(42))
        );
    }

    #[test]
    fn value_reports_its_type() {
        assert_eq!(FieldValue::from(3i32).field_type(), FieldType::Integer);
        assert_eq!(FieldValue::from("x").field_type(), FieldType::String);
        assert!(FieldValue::Null.is_null());
    }

    #[test]
    fn doubles_compare_by_bits() {
        assert_ne!(FieldValue::Double(-0.0), FieldValue::Double(0.0));
        assert_eq!(FieldValue::Double(f64::NAN), FieldValue::Double(f64::NAN));
        assert_ne!(FieldValue::Long(0), FieldValue::Integer(0));
    }

    #[test]
    fn geometry_envelope_exposed() {
        let g = Geometry::new(vec![1, 2, 3], Envelope::point(1.0, 2.0));
        let v = FieldValue::from(g);
        assert_eq!(v.envelope(), Some(&Envelope::point(1.0, 2.0)));
        assert!(FieldValue::Long(1).envelope().is_none());
    }

    #[test]
    fn display_names() {
        assert_eq!(FieldType::Geometry.to_string(), "geometry");
        assert_eq!(FieldType::Long.to_string(), "long");
    }
}
