//! Provisioning attempt identifiers.
//!
//! ULID ベースの ID。時刻でソート可能なので、複数プロセスが同時に
//! provision したときのログを時系列で並べられる。

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifier of one provisioning call (one span in the logs).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttemptId(Ulid);

impl AttemptId {
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt-{}", self.0)
    }
}
