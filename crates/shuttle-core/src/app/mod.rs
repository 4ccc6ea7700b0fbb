//! App - アプリケーション層
//!
//! ports と typed を組み合わせて、呼び出しから callback までの経路を作ります。
//!
//! # 主要コンポーネント
//! - **ClientBuilder**: client の構築とワイヤリング
//! - **Cluster**: 接続と entity の入り口
//! - **Dispatcher**: worker pool への投入と caller への配送
//! - **binder / cursor**: 引数の同期的な束縛
//! - **marshal**: 結果の caller 向け値への変換

pub mod binder;
pub mod builder;
pub mod cluster;
pub mod connection;
pub mod cursor;
pub mod descriptor;
pub mod dispatcher;
pub mod marshal;
pub mod status;

pub use self::builder::{BuildError, Client, ClientBuilder};
pub use self::cluster::Cluster;
pub use self::connection::ConnectionHandle;
pub use self::descriptor::TaskDescriptor;
pub use self::dispatcher::Dispatcher;
pub use self::status::{DispatchCounts, DispatchSnapshot};
