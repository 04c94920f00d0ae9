//! Errors - エラー型と分類
//!
//! hard / soft の分類:
//! - hard: `ProvisionError` として呼び出し元に返す
//! - soft: `RegistryError`（fallback へ。ただし `Digest` は hard）、discovery / gc の `RuntimeError`（ログのみ）

use std::fmt;
use std::time::Duration;

use super::digest::DigestError;
use super::reference::ReferenceError;

/// Runtime operation that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeOp {
    List,
    Start,
    Run,
    Remove,
}

impl fmt::Display for RuntimeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuntimeOp::List => "list",
            RuntimeOp::Start => "start",
            RuntimeOp::Run => "run",
            RuntimeOp::Remove => "remove",
        };
        f.write_str(s)
    }
}

/// A container runtime call that failed in a way we do not recognize.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Non-zero exit with output we could not classify. `diagnostic` is the raw text.
    #[error("failed to {op} container {target}: {diagnostic}")]
    Invocation {
        op: RuntimeOp,
        target: String,
        diagnostic: String,
    },

    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl RuntimeError {
    pub fn invocation(op: RuntimeOp, target: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self::Invocation {
            op,
            target: target.into(),
            diagnostic: diagnostic.into(),
        }
    }

    /// Raw runtime output, when there is one.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            RuntimeError::Invocation { diagnostic, .. } => Some(diagnostic),
            RuntimeError::Spawn { .. } => None,
        }
    }
}

/// Failure to resolve a tag to a digest. Soft for the provisioner, except
/// `Digest`: a malformed digest fails the call instead of falling back.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry denied access ({status}): {message}")]
    Denied { status: u16, message: String },

    #[error("registry rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("registry returned unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("registry request failed: {0}")]
    Transport(String),

    #[error("registry token exchange failed: {0}")]
    Token(String),

    #[error("registry response carried no content digest")]
    MissingDigest,

    #[error("registry returned a malformed digest: {0}")]
    Digest(#[from] DigestError),
}

impl RegistryError {
    /// Authentication/authorization failures usually mean stale credentials,
    /// unlike transient network errors.
    pub fn is_auth_denied(&self) -> bool {
        matches!(self, RegistryError::Denied { .. })
    }
}

/// Hard failures of a provisioning call.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("parsing image reference: {0}")]
    Reference(#[from] ReferenceError),

    #[error("no fallback container found: image digest could not be resolved and no leftover engine exists")]
    NoFallback,

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("provisioning cancelled")]
    Cancelled,

    #[error("provisioning did not finish within {0:?}")]
    DeadlineExceeded(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_error_keeps_raw_diagnostic() {
        let err = RuntimeError::invocation(RuntimeOp::Run, "berth-engine-x", "Error: boom\n");
        assert_eq!(err.diagnostic(), Some("Error: boom\n"));
        assert!(err.to_string().contains("failed to run container berth-engine-x"));
    }

    #[test]
    fn only_denied_is_auth_failure() {
        let denied = RegistryError::Denied {
            status: 403,
            message: "DENIED".to_string(),
        };
        assert!(denied.is_auth_denied());
        assert!(!RegistryError::Transport("connection reset".to_string()).is_auth_denied());
        assert!(!RegistryError::RateLimited("toomanyrequests".to_string()).is_auth_denied());
    }

    #[test]
    fn runtime_error_is_transparent_in_provision_error() {
        let err: ProvisionError =
            RuntimeError::invocation(RuntimeOp::Start, "berth-engine-x", "no such container").into();
        assert_eq!(
            err.to_string(),
            "failed to start container berth-engine-x: no such container"
        );
    }
}
