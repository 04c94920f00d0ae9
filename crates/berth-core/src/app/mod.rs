//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせて provisioning を実装します。
//!
//! # 主要コンポーネント
//! - **ProvisionerBuilder**: 構築とワイヤリング
//! - **Provisioner**: resolve → discover → decide → start/run → gc
//! - **GarbageCollector**: 不要インスタンスの削除
//! - identity / discovery: 各ステップ（soft failure はここで吸収）

pub mod builder;
pub mod discovery;
pub mod gc;
pub mod identity;
pub mod provisioner;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, ProvisionerBuilder};
pub use self::discovery::{discover, try_discover};
pub use self::gc::GarbageCollector;
pub use self::identity::resolve_identity;
pub use self::provisioner::Provisioner;
