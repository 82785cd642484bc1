//! Foundation types for GeoVC.
//!
//! This crate provides the identity and value types shared by every other
//! GeoVC crate: content-addressed object identifiers, spatial envelopes used
//! as entry bounds, and the typed field values stored in features.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- 20-byte content hash; the all-zero value means "absent"
//! - [`Envelope`] -- axis-aligned bounding box attached to tree entries
//! - [`FieldValue`] / [`FieldType`] -- typed attribute values of a feature
//! - [`Geometry`] -- opaque geometry payload carrying its own envelope

pub mod envelope;
pub mod error;
pub mod object;
pub mod value;

pub use envelope::Envelope;
pub use error::TypeError;
pub use object::{ObjectId, NUM_BYTES};
pub use value::{FieldType, FieldValue, Geometry};
