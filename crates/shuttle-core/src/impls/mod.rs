//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryCluster**: プロセス内で完結する native 層
//!
//! 実際のデータベースへのバインディングは別クレートで `NativeConnector` を実装します。

pub mod inmem_native;

pub use self::inmem_native::InMemoryCluster;
