//! RegistryResolver port - tag から content digest への解決
//!
//! # 実装
//! - `impls::OciRegistryResolver`: OCI distribution API（本番用）
//! - `impls::StaticResolver`: テスト用

use async_trait::async_trait;

use crate::domain::{ContentDigest, RegistryError, ServiceReference};

/// RegistryResolver はリモートレジストリに問い合わせて digest を返す
///
/// 失敗はすべて `RegistryError` で返す。それを soft failure として扱うのは
/// 呼び出し側（`app::identity`）の責務。
#[async_trait]
pub trait RegistryResolver: Send + Sync {
    async fn resolve(&self, reference: &ServiceReference) -> Result<ContentDigest, RegistryError>;
}
