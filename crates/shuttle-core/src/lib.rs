//! shuttle-core
//!
//! ブロッキングなデータベースクライアントを、callback 形式の非同期 API として
//! 公開するためのコア。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（error code、値、task descriptor、time-series 型）
//! - **ports**: 抽象化レイヤー（NativeConnector / NativeSession、Clock、IdGenerator）
//! - **app**: 接続、dispatcher、引数束縛、結果変換、builder
//! - **typed**: entity kind ごとの型付き API と KindRegistry
//! - **impls**: 実装（InMemoryCluster など開発用）
//! - **config**: 接続設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;
