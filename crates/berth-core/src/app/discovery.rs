//! Instance discovery: which engine containers already exist.

use crate::domain::{LeftoverSet, RuntimeError};
use crate::ports::ContainerRuntime;

/// List instances carrying `prefix`, in runtime order (newest first).
///
/// A listing failure is logged and yields an empty set; provisioning then
/// proceeds as if nothing existed.
pub async fn discover(runtime: &dyn ContainerRuntime, prefix: &str) -> LeftoverSet {
    match try_discover(runtime, prefix).await {
        Ok(leftovers) => leftovers,
        Err(err) => {
            tracing::warn!(prefix, error = %err, "listing engine containers failed, assuming none exist");
            LeftoverSet::default()
        }
    }
}

/// Like [`discover`] but surfaces the listing error.
pub async fn try_discover(
    runtime: &dyn ContainerRuntime,
    prefix: &str,
) -> Result<LeftoverSet, RuntimeError> {
    let lines = runtime.list(prefix).await?;
    let leftovers = LeftoverSet::from_listing(prefix, &lines);
    tracing::debug!(prefix, found = leftovers.len(), "discovered leftover engines");
    Ok(leftovers)
}
