use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Number of bytes in an [`ObjectId`].
pub const NUM_BYTES: usize = 20;

/// Content-addressed identifier for any revision object.
///
/// An `ObjectId` is the SHA-1 hash of an object's canonical encoding.
/// Identical content always produces the same `ObjectId`. Ids are totally
/// ordered by byte-wise comparison.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId([u8; NUM_BYTES]);

impl ObjectId {
    /// The null object ID (all zeros). Represents "no object".
    pub const NULL: Self = Self([0u8; NUM_BYTES]);

    /// Create an `ObjectId` from a pre-computed hash.
    pub const fn from_raw(hash: [u8; NUM_BYTES]) -> Self {
        Self(hash)
    }

    /// Create an `ObjectId` from a slice, which must be exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; NUM_BYTES] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: NUM_BYTES,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// The null object ID.
    pub const fn null() -> Self {
        Self::NULL
    }

    /// Returns `true` if this is the null object ID.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; NUM_BYTES]
    }

    /// The raw 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; NUM_BYTES] {
        &self.0
    }

    /// Byte at position `index`, used to derive bucket indices per depth.
    pub fn byte_at(&self, index: usize) -> u8 {
        self.0[index % NUM_BYTES]
    }

    /// Hex-encoded string representation (40 lowercase characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Hex encoding of the first `num_bytes` bytes.
    ///
    /// `num_bytes` is clamped to `1..=20`.
    pub fn to_short_hex(&self, num_bytes: usize) -> String {
        let n = num_bytes.clamp(1, NUM_BYTES);
        hex::encode(&self.0[..n])
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        self.to_short_hex(4)
    }

    /// Returns `true` if the hex form of this id starts with `prefix`.
    ///
    /// Comparison is case-insensitive on the prefix.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        let prefix = prefix.to_ascii_lowercase();
        self.to_hex().starts_with(&prefix)
    }

    /// Parse from a 40-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; NUM_BYTES]> for ObjectId {
    fn from(bytes: [u8; NUM_BYTES]) -> Self {
        Self(bytes)
    }
}

impl From<ObjectId> for [u8; NUM_BYTES] {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}
