//! Domain model (references, digests, names, decisions, outcomes, ...).
//!
//! ここには I/O を一切置かない。runtime / registry とのやりとりは
//! `ports` の trait 越しに `app` が行う。

pub mod decision;
pub mod digest;
pub mod errors;
pub mod identity;
pub mod ids;
pub mod leftovers;
pub mod names;
pub mod outcome;
pub mod reference;

pub use decision::{Decider, Decision, DefaultDecider};
pub use digest::{ContentDigest, DigestError};
pub use errors::{ProvisionError, RegistryError, RuntimeError, RuntimeOp};
pub use identity::ResolvedIdentity;
pub use ids::AttemptId;
pub use leftovers::LeftoverSet;
pub use names::{DEFAULT_INSTANCE_PREFIX, HASH_LEN, InstanceName};
pub use outcome::{CollectReport, ProvisionOutcome, ProvisionPath};
pub use reference::{ReferenceError, Selector, ServiceReference};
