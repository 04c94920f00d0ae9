//! Content digests (`sha256:<hex>`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Algorithm prefix accepted for engine image digests.
pub const SHA256_PREFIX: &str = "sha256:";

/// Length of a hex-encoded sha256 hash.
pub const SHA256_HEX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigestError {
    #[error("digest {0:?} is missing the sha256: prefix")]
    MissingAlgorithm(String),

    #[error("digest {digest:?} has {len} hex characters, expected {SHA256_HEX_LEN}")]
    BadLength { digest: String, len: usize },

    #[error("digest {0:?} contains characters outside lowercase hex")]
    NotHex(String),
}

/// A content digest in `sha256:<64 lowercase hex>` form.
///
/// Only sha256 is accepted. Anything else is rejected at parse time so
/// that instance names are never derived from garbage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest {
    hex: String,
}

impl ContentDigest {
    pub fn parse(s: &str) -> Result<Self, DigestError> {
        let Some(hex) = s.strip_prefix(SHA256_PREFIX) else {
            return Err(DigestError::MissingAlgorithm(s.to_string()));
        };
        if hex.len() != SHA256_HEX_LEN {
            return Err(DigestError::BadLength {
                digest: s.to_string(),
                len: hex.len(),
            });
        }
        if !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(DigestError::NotHex(s.to_string()));
        }
        Ok(Self {
            hex: hex.to_string(),
        })
    }

    /// The hex part, without the algorithm prefix.
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// The first `len` hex characters (clamped to the full hash).
    pub fn short(&self, len: usize) -> &str {
        &self.hex[..len.min(self.hex.len())]
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SHA256_PREFIX}{}", self.hex)
    }
}

impl FromStr for ContentDigest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = DigestError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ContentDigest> for String {
    fn from(d: ContentDigest) -> Self {
        d.to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rstest::rstest;

    pub(crate) const DIGEST_A: &str =
        "sha256:3f1c9a0b7d2e4f6a8b0c1d2e3f4a5b6c7d8e9f0a1b2c3d4e5f6a7b8c9d0e1f2a";
    pub(crate) const DIGEST_B: &str =
        "sha256:0a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f9";

    #[test]
    fn parses_and_displays_sha256() {
        let d = ContentDigest::parse(DIGEST_A).unwrap();
        assert_eq!(d.to_string(), DIGEST_A);
        assert_eq!(d.hex().len(), SHA256_HEX_LEN);
        assert_eq!(d.short(16), "3f1c9a0b7d2e4f6a");
    }

    #[rstest]
    #[case::no_prefix("3f1c9a0b7d2e4f6a8b0c1d2e3f4a5b6c7d8e9f0a1b2c3d4e5f6a7b8c9d0e1f2a")]
    #[case::other_algorithm("sha512:3f1c9a0b7d2e4f6a")]
    #[case::too_short("sha256:3f1c9a0b")]
    #[case::uppercase("sha256:3F1C9A0B7D2E4F6A8B0C1D2E3F4A5B6C7D8E9F0A1B2C3D4E5F6A7B8C9D0E1F2A")]
    #[case::empty("")]
    fn rejects_malformed_digests(#[case] input: &str) {
        assert!(ContentDigest::parse(input).is_err());
    }

    #[test]
    fn serde_uses_string_form() {
        let d = ContentDigest::parse(DIGEST_B).unwrap();
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, format!("\"{DIGEST_B}\""));
        assert!(serde_json::from_str::<ContentDigest>("\"sha256:nope\"").is_err());
    }
}
