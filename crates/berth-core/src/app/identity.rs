//! Identity resolution: service reference → content digest.
//!
//! A pinned reference never touches the network. Registry failures are
//! soft: they are logged and reported as `ResolvedIdentity::Unavailable`,
//! which sends the provisioner down the fallback path. The one exception is
//! a digest the registry returned in a malformed shape, which is an error.

use crate::domain::{ReferenceError, RegistryError, ResolvedIdentity, ServiceReference};
use crate::ports::RegistryResolver;

pub async fn resolve_identity(
    resolver: &dyn RegistryResolver,
    reference: &ServiceReference,
) -> Result<ResolvedIdentity, ReferenceError> {
    if let Some(digest) = reference.pinned_digest() {
        tracing::debug!(%digest, "reference is pinned, skipping registry lookup");
        return Ok(ResolvedIdentity::Pinned(digest.clone()));
    }

    let identity = match resolver.resolve(reference).await {
        Ok(digest) => {
            tracing::debug!(%digest, "resolved image digest");
            ResolvedIdentity::Resolved(digest)
        }
        Err(RegistryError::Digest(err)) => return Err(ReferenceError::Digest(err)),
        Err(err) if err.is_auth_denied() => {
            tracing::warn!(
                error = %err,
                "registry denied the digest lookup; credentials may be missing or stale \
                 (try logging in to the registry again). Falling back to an existing engine"
            );
            ResolvedIdentity::Unavailable(err)
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to resolve image digest, falling back to an existing engine");
            ResolvedIdentity::Unavailable(err)
        }
    };
    Ok(identity)
}
