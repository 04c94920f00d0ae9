//! Decision model: which instance to bring up and which ones to collect.
//!
//! This module defines the Decision type (what to do) and the Decider trait
//! (how to choose it from the resolved identity and the leftover set).
//! Executing a decision against a runtime is the provisioner's job.

use super::digest::ContentDigest;
use super::leftovers::LeftoverSet;
use super::names::InstanceName;

/// What the provisioner should do with the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// An instance named after the digest already exists: start it.
    Reuse {
        target: InstanceName,
        collect: Vec<InstanceName>,
    },

    /// No instance for the digest yet: create one with this name.
    Create {
        target: InstanceName,
        collect: Vec<InstanceName>,
    },

    /// Identity unknown: start the newest leftover instead.
    FallBack {
        target: InstanceName,
        collect: Vec<InstanceName>,
    },

    /// Identity unknown and nothing to fall back to.
    NoFallback,
}

impl Decision {
    pub fn target(&self) -> Option<&InstanceName> {
        match self {
            Decision::Reuse { target, .. }
            | Decision::Create { target, .. }
            | Decision::FallBack { target, .. } => Some(target),
            Decision::NoFallback => None,
        }
    }

    /// Instances handed to the garbage collector once the target is up.
    pub fn collect(&self) -> &[InstanceName] {
        match self {
            Decision::Reuse { collect, .. }
            | Decision::Create { collect, .. }
            | Decision::FallBack { collect, .. } => collect,
            Decision::NoFallback => &[],
        }
    }
}

/// Trait for choosing a [`Decision`].
///
/// Deciders are pure functions: given the identity and the leftovers, they
/// return the next action without side effects.
pub trait Decider: Send + Sync {
    fn decide(&self, digest: Option<&ContentDigest>, leftovers: &LeftoverSet) -> Decision;
}

/// Default decider: reuse by exact name, otherwise create; fall back to the
/// newest leftover only when the digest is unknown.
#[derive(Debug, Clone)]
pub struct DefaultDecider {
    prefix: String,
}

impl DefaultDecider {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, digest: Option<&ContentDigest>, leftovers: &LeftoverSet) -> Decision {
        match digest {
            Some(digest) => {
                let target = InstanceName::for_digest(&self.prefix, digest);
                let collect = leftovers.without(&target);
                if leftovers.contains(&target) {
                    Decision::Reuse { target, collect }
                } else {
                    Decision::Create { target, collect }
                }
            }
            None => match leftovers.newest() {
                Some(newest) => Decision::FallBack {
                    target: newest.clone(),
                    collect: leftovers.without(newest),
                },
                None => Decision::NoFallback,
            },
        }
    }
}
