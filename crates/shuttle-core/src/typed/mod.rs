//! Typed - entity kind ごとの型付き API
//!
//! # 二層構造
//! - **表層（Typed）**: `Blob`、`Deque`、`Column<K>` などの具象型。
//!   共通の操作は `Entity` → `Entry` → `Expirable` の default method で獲得
//! - **内部（Dyn）**: `DynEntity` - メソッド名で呼び出す object-safe な形
//!
//! 動的な呼び出しは `KindRegistry` が仲介します。

pub mod blob;
pub mod column;
pub mod deque;
pub mod entity;
pub mod entry;
pub mod hset;
pub mod integer;
pub mod query;
pub mod range;
pub mod registry;
pub mod search;
pub mod tag;
pub mod time_series;

#[cfg(test)]
pub(crate) mod testing;

pub use self::blob::Blob;
pub use self::column::{
    BlobColumn, BlobKind, Column, ColumnKind, DoubleColumn, DoubleKind, Int64Column, Int64Kind, StringColumn,
    StringKind, SymbolColumn, SymbolKind, TimestampColumn, TimestampKind,
};
pub use self::deque::Deque;
pub use self::entity::{Entity, EntityRef};
pub use self::entry::{Entry, Expirable};
pub use self::hset::HSet;
pub use self::integer::Integer;
pub use self::query::{Query, QueryFind};
pub use self::range::Range;
pub use self::registry::{DynEntity, EntityKind, KindRegistry, Method, RegistryError, TypedEntity};
pub use self::search::{Prefix, Suffix};
pub use self::tag::Tag;
pub use self::time_series::TimeSeries;
