//! Serializable summary of a provisioning call, for `--json` output and logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{InstanceName, ProvisionOutcome, ProvisionPath};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectCounts {
    pub removed: usize,
    pub in_progress: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub attempt: String,
    pub instance: InstanceName,
    pub handle: String,
    pub path: ProvisionPath,
    pub conflict_absorbed: bool,
    pub collected: CollectCounts,
    pub finished_at: DateTime<Utc>,
}

impl ProvisionReport {
    pub fn new(outcome: &ProvisionOutcome) -> Self {
        Self::at(outcome, Utc::now())
    }

    pub fn at(outcome: &ProvisionOutcome, finished_at: DateTime<Utc>) -> Self {
        Self {
            attempt: outcome.attempt.to_string(),
            instance: outcome.instance.clone(),
            handle: outcome.handle.clone(),
            path: outcome.path,
            conflict_absorbed: outcome.conflict_absorbed,
            collected: CollectCounts {
                removed: outcome.collected.removed.len(),
                in_progress: outcome.collected.in_progress.len(),
                failed: outcome.collected.failed.len(),
            },
            finished_at,
        }
    }
}
