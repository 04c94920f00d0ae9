//! Result of resolving a service reference to a content digest.

use super::digest::ContentDigest;
use super::errors::RegistryError;

/// Identity of the engine image for one provisioning attempt.
///
/// Never persisted: the only durable trace of an identity is the name of the
/// container created from it.
#[derive(Debug)]
pub enum ResolvedIdentity {
    /// The reference already carried a digest; no lookup happened.
    Pinned(ContentDigest),

    /// The registry mapped the tag to this digest.
    Resolved(ContentDigest),

    /// Lookup failed. Kept for logging only.
    Unavailable(RegistryError),
}

impl ResolvedIdentity {
    pub fn digest(&self) -> Option<&ContentDigest> {
        match self {
            ResolvedIdentity::Pinned(d) | ResolvedIdentity::Resolved(d) => Some(d),
            ResolvedIdentity::Unavailable(_) => None,
        }
    }

    pub fn is_known(&self) -> bool {
        self.digest().is_some()
    }
}
