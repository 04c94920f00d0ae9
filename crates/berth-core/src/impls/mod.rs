//! Impls - ports の実装
//!
//! # 本番用
//! - **CliRuntime**: docker / podman / nerdctl の CLI を叩く ContainerRuntime
//! - **OciRegistryResolver**: OCI distribution API で tag を digest に解決
//!
//! # テスト用
//! - **InMemoryRuntime**: 呼び出しを記録する ContainerRuntime
//! - **StaticResolver**: 固定の結果を返す RegistryResolver

pub mod cli_runtime;
pub mod memory_runtime;
pub mod oci_registry;
pub mod phrases;
pub mod static_resolver;

pub use self::cli_runtime::{CliRuntime, RuntimeFlavor};
pub use self::memory_runtime::{InMemoryRuntime, RuntimeCall};
pub use self::oci_registry::{Credentials, OciRegistryResolver};
pub use self::phrases::{PHRASE_TABLE_VERSION, Phrase, PhraseTable, Recognized};
pub use self::static_resolver::StaticResolver;
