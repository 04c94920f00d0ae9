//! ProvisionerBuilder - Provisioner の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 環境変数は構築時に一度だけ読む（`EngineEnv`）

use std::sync::Arc;

use super::provisioner::Provisioner;
use crate::config::{ConfigError, EngineEnv, ProvisionerConfig};
use crate::domain::{Decider, DefaultDecider};
use crate::ports::{ContainerRuntime, RegistryResolver};

/// ProvisionerBuilder は Provisioner を構築
///
/// # 使用例
/// ```ignore
/// let provisioner = Provisioner::builder()
///     .resolver(Arc::new(OciRegistryResolver::new("berth/0.1")?))
///     .runtime(Arc::new(CliRuntime::new(RuntimeFlavor::Docker)))
///     .config(ProvisionerConfig::load(None)?)
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - resolver / runtime が未設定なら BuildError
/// - config の検証に失敗したら BuildError
pub struct ProvisionerBuilder {
    resolver: Option<Arc<dyn RegistryResolver>>,
    runtime: Option<Arc<dyn ContainerRuntime>>,
    decider: Option<Box<dyn Decider>>,
    config: ProvisionerConfig,
    env: Option<EngineEnv>,
}

/// BuildError は Provisioner 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no registry resolver configured")]
    MissingResolver,

    #[error("no container runtime configured")]
    MissingRuntime,

    #[error("invalid provisioner config: {0}")]
    Config(#[from] ConfigError),
}

impl ProvisionerBuilder {
    pub fn new() -> Self {
        Self {
            resolver: None,
            runtime: None,
            decider: None,
            config: ProvisionerConfig::default(),
            env: None,
        }
    }

    pub fn resolver(mut self, resolver: Arc<dyn RegistryResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn runtime(mut self, runtime: Arc<dyn ContainerRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Replace the default reuse/create/fallback policy.
    pub fn decider(mut self, decider: Box<dyn Decider>) -> Self {
        self.decider = Some(decider);
        self
    }

    pub fn config(mut self, config: ProvisionerConfig) -> Self {
        self.config = config;
        self
    }

    /// Environment handed to new engines. Read from the process environment
    /// at `build()` time when not set.
    pub fn env(mut self, env: EngineEnv) -> Self {
        self.env = Some(env);
        self
    }

    pub fn build(self) -> Result<Provisioner, BuildError> {
        let resolver = self.resolver.ok_or(BuildError::MissingResolver)?;
        let runtime = self.runtime.ok_or(BuildError::MissingRuntime)?;
        self.config.validate()?;

        let decider = self
            .decider
            .unwrap_or_else(|| Box::new(DefaultDecider::new(self.config.instance_prefix.clone())));
        Ok(Provisioner {
            resolver,
            runtime,
            decider,
            env: self.env.unwrap_or_else(EngineEnv::from_env),
            config: self.config,
        })
    }
}

impl Default for ProvisionerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
