//! ContainerRuntime port - 外部コンテナランタイム（docker / podman / nerdctl）
//!
//! ランタイムのテキスト出力はここで構造化された結果に正規化される。
//! 「名前がすでに使われている」は失敗ではなく `RunOutcome::AlreadyExists`。

use async_trait::async_trait;
use std::fmt;

use crate::domain::{InstanceName, RuntimeError};

/// Result of creating a named instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Created,

    /// The runtime refused because the name is taken, most likely by a
    /// concurrent provisioner. Success-equivalent.
    AlreadyExists,
}

/// Result of removing an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,

    /// Someone else is already removing it.
    AlreadyInProgress,
}

/// Environment variable handed to the container.
///
/// Values are passed to the runtime process environment and referenced by
/// name on the command line, so they never show up in argv. `Debug` redacts them.
#[derive(Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Debug for EnvVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvVar")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Volume mount. `source: None` asks the runtime for an anonymous volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub source: Option<String>,
    pub target: String,
}

impl Mount {
    pub fn anonymous(target: impl Into<String>) -> Self {
        Self {
            source: None,
            target: target.into(),
        }
    }

    pub fn bind(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            target: target.into(),
        }
    }
}

/// Everything needed to create an engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub name: InstanceName,
    pub image: String,
    pub env: Vec<EnvVar>,
    pub mounts: Vec<Mount>,
    pub privileged: bool,
    pub restart: Option<String>,

    /// Arguments appended after the image (passed to the engine entrypoint).
    pub args: Vec<String>,
}

/// ContainerRuntime は名前付きインスタンスの list / start / run / remove を提供
///
/// # 設計原則
/// - 1 メソッド = 1 回のランタイム呼び出し（リトライしない）
/// - 認識できない失敗は生の診断テキストを持つ `RuntimeError` で返す
/// - future が drop されたら外部プロセスも止める
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Names of all instances (running or not) whose name starts with `prefix`,
    /// newest first.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, RuntimeError>;

    /// Start an instance. A no-op if it is already running.
    async fn start(&self, name: &InstanceName) -> Result<(), RuntimeError>;

    async fn run(&self, spec: &RunSpec) -> Result<RunOutcome, RuntimeError>;

    /// Force-remove an instance together with its anonymous volumes.
    async fn remove(&self, name: &InstanceName) -> Result<RemoveOutcome, RuntimeError>;

    /// Address clients use to reach the instance.
    fn connection_handle(&self, name: &InstanceName) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_debug_is_redacted() {
        let var = EnvVar::new("BERTH_CLOUD_TOKEN", "s3cr3t");
        let out = format!("{var:?}");
        assert!(out.contains("BERTH_CLOUD_TOKEN"));
        assert!(!out.contains("s3cr3t"));
    }
}
