//! Instance naming convention.
//!
//! An engine instance is named `prefix + first HASH_LEN hex chars of its image digest`.
//! The same digest always yields the same name, which is what lets concurrent
//! provisioners converge on one container without coordinating.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::digest::ContentDigest;

/// Default prefix shared by every instance this crate manages.
pub const DEFAULT_INSTANCE_PREFIX: &str = "berth-engine-";

/// Number of digest hex characters kept in an instance name.
///
/// 16 hex chars = 64 bits, so collisions within one prefix namespace are
/// negligible while `docker ps` output stays readable.
pub const HASH_LEN: usize = 16;

/// Name of a runtime container.
///
/// Names reported by the runtime are wrapped as-is; names we derive ourselves
/// come from [`InstanceName::for_digest`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceName(String);

impl InstanceName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn for_digest(prefix: &str, digest: &ContentDigest) -> Self {
        Self(format!("{prefix}{}", digest.short(HASH_LEN)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Anchored prefix match (never a substring match).
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for InstanceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for InstanceName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl PartialEq<str> for InstanceName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for InstanceName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::digest::tests::{DIGEST_A, DIGEST_B};

    #[test]
    fn naming_is_idempotent() {
        let d = ContentDigest::parse(DIGEST_A).unwrap();
        let first = InstanceName::for_digest(DEFAULT_INSTANCE_PREFIX, &d);
        let second = InstanceName::for_digest(DEFAULT_INSTANCE_PREFIX, &d);
        assert_eq!(first, second);
        assert_eq!(first, "berth-engine-3f1c9a0b7d2e4f6a");
    }

    #[test]
    fn different_digests_get_different_names() {
        let a = ContentDigest::parse(DIGEST_A).unwrap();
        let b = ContentDigest::parse(DIGEST_B).unwrap();
        assert_ne!(
            InstanceName::for_digest(DEFAULT_INSTANCE_PREFIX, &a),
            InstanceName::for_digest(DEFAULT_INSTANCE_PREFIX, &b)
        );
    }

    #[test]
    fn suffix_is_fixed_length_lowercase_hex() {
        let d = ContentDigest::parse(DIGEST_B).unwrap();
        let name = InstanceName::for_digest("p-", &d);
        let suffix = name.as_str().strip_prefix("p-").unwrap();
        assert_eq!(suffix.len(), HASH_LEN);
        assert!(suffix.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn prefix_match_is_anchored() {
        let name = InstanceName::new("my-berth-engine-0011223344556677");
        assert!(!name.has_prefix(DEFAULT_INSTANCE_PREFIX));
        assert!(InstanceName::new("berth-engine-x").has_prefix(DEFAULT_INSTANCE_PREFIX));
    }
}
