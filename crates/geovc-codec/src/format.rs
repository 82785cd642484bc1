use std::fmt;

use crate::error::{CodecError, CodecResult};

/// Literal node or bucket.
pub(crate) const LITERAL: u8 = 1;
/// Delta placeholder followed by an index.
pub(crate) const PLACEHOLDER: u8 = 0xFF;

/// Encoding version. It is never embedded in encoded objects; the caller
/// knows which version a byte source uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormatVersion {
    /// Plain trees. Delta trees are written in materialized form.
    V1,
    /// Delta-aware trees with literal/placeholder discriminators.
    V2,
}

impl FormatVersion {
    pub const LATEST: Self = Self::V2;

    pub fn as_u8(&self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }

    pub fn from_u8(v: u8) -> CodecResult<Self> {
        match v {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(CodecError::UnsupportedVersion(other)),
        }
    }

    pub fn supports_delta(&self) -> bool {
        *self >= Self::V2
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_numbers() {
        assert_eq!(FormatVersion::from_u8(1).unwrap(), FormatVersion::V1);
        assert_eq!(FormatVersion::from_u8(2).unwrap(), FormatVersion::LATEST);
        assert!(matches!(
            FormatVersion::from_u8(3),
            Err(CodecError::UnsupportedVersion(3))
        ));
        assert!(!FormatVersion::V1.supports_delta());
        assert!(FormatVersion::V2.supports_delta());
        assert_eq!(FormatVersion::V2.to_string(), "v2");
    }
}
