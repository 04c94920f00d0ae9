//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（コンテナランタイム、イメージレジストリ）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - 永続状態を持つのはランタイム側だけ（名前付きコンテナの集合）
//! - このクレートはその名前空間を排他的に所有しているとは仮定しない

pub mod container_runtime;
pub mod registry_resolver;

pub use self::container_runtime::{
    ContainerRuntime, EnvVar, Mount, RemoveOutcome, RunOutcome, RunSpec,
};
pub use self::registry_resolver::RegistryResolver;
