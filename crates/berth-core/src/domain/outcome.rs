//! Outcome of a provisioning call.

use serde::{Deserialize, Serialize};

use super::ids::AttemptId;
use super::names::InstanceName;

/// Which branch of the reconciliation produced the running instance.
///
/// Serialized as snake_case: `reused` / `created` / `fallen_back`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionPath {
    /// An instance named after the digest existed and was started.
    /// Also used when `run` lost a creation race to another provisioner.
    Reused,

    /// A new instance was created.
    Created,

    /// The digest was unknown; the newest leftover was started instead.
    FallenBack,
}

/// What the garbage collector did with the non-selected instances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectReport {
    pub removed: Vec<InstanceName>,

    /// Another collector was already removing these.
    pub in_progress: Vec<InstanceName>,

    pub failed: Vec<InstanceName>,
}

impl CollectReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A usable engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionOutcome {
    pub attempt: AttemptId,
    pub instance: InstanceName,

    /// Runtime-specific address, e.g. `docker-container://berth-engine-…`.
    pub handle: String,
    pub path: ProvisionPath,

    /// `run` reported that the name was already taken and we adopted it.
    #[serde(default)]
    pub conflict_absorbed: bool,

    #[serde(default)]
    pub collected: CollectReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&ProvisionPath::FallenBack).unwrap(), "\"fallen_back\"");
        assert_eq!(serde_json::to_string(&ProvisionPath::Reused).unwrap(), "\"reused\"");
    }
}
