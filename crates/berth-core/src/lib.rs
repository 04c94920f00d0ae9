//! berth-core
//!
//! Core building blocks for provisioning berth engine containers.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（reference, digest, names, leftovers, decision, outcome, errors）
//! - **ports**: 抽象化レイヤー（ContainerRuntime, RegistryResolver）
//! - **app**: アプリケーションロジック（builder, provisioner, discovery, gc）
//! - **impls**: 実装（CliRuntime, OciRegistryResolver, テスト用 fake）
//! - **config**: ProvisionerConfig と EngineEnv
//! - **observability**: `--json` 用のレポート

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;

pub use app::{BuildError, Provisioner, ProvisionerBuilder};
pub use config::{ConfigError, EngineEnv, ProvisionerConfig};
pub use domain::{ProvisionError, ProvisionOutcome, ProvisionPath};
pub use observability::ProvisionReport;
