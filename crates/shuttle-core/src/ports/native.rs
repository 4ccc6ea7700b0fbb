//! Native port - ブロッキングなデータベースクライアント API
//!
//! ネイティブ層は不透明なブロッキング呼び出しの集まりとして扱います。
//! どのメソッドも worker スレッドからのみ呼ばれ、status の `ErrorCode`
//! か `Result<T, ErrorCode>` を返します。
//!
//! 配列を返す呼び出しは `NativeArray` で返し、呼び出し元が drop した
//! 時点でネイティブ側の確保が解放されます。

use std::sync::Arc;

use crate::domain::buffer::{NativeArray, NativeBuffer};
use crate::domain::errors::ErrorCode;
use crate::domain::metadata::{EntryMetadata, EntryType};
use crate::domain::query::QueryResult;
use crate::domain::series::{Aggregation, AggregationResult, ColumnInfo, ColumnType, Point};
use crate::domain::time::{Expiry, Timespec, TsRange};

/// Credentials は secured cluster への接続情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub cluster_public_key: String,
    pub user_name: String,
    pub user_private_key: String,
}

/// NativeConnector は新しい native handle を開く
pub trait NativeConnector: Send + Sync {
    fn open(
        &self,
        uri: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Arc<dyn NativeSession>, ErrorCode>;
}

/// NativeSession は接続済みの native handle
pub trait NativeSession: Send + Sync {
    fn set_timeout(&self, timeout_ms: u32) -> ErrorCode;

    // entry
    fn remove(&self, alias: &str) -> ErrorCode;
    fn attach_tag(&self, alias: &str, tag: &str) -> ErrorCode;
    fn attach_tags(&self, alias: &str, tags: &[String]) -> ErrorCode;
    fn detach_tag(&self, alias: &str, tag: &str) -> ErrorCode;
    fn detach_tags(&self, alias: &str, tags: &[String]) -> ErrorCode;
    fn has_tag(&self, alias: &str, tag: &str) -> ErrorCode;
    fn get_tags(&self, alias: &str) -> Result<NativeArray<String>, ErrorCode>;
    fn get_metadata(&self, alias: &str) -> Result<EntryMetadata, ErrorCode>;
    fn get_type(&self, alias: &str) -> Result<EntryType, ErrorCode>;

    // expiry
    fn expires_at(&self, alias: &str, expiry: Expiry) -> ErrorCode;
    /// 現在時刻から `delta_secs` 秒後に期限を設定する
    fn expires_from_now(&self, alias: &str, delta_secs: i64) -> ErrorCode;
    /// `None` は期限なし
    fn get_expiry(&self, alias: &str) -> Result<Option<Timespec>, ErrorCode>;

    // blob
    fn blob_put(&self, alias: &str, content: &[u8], expiry: Expiry) -> ErrorCode;
    fn blob_update(&self, alias: &str, content: &[u8], expiry: Expiry) -> ErrorCode;
    fn blob_get(&self, alias: &str) -> Result<NativeBuffer, ErrorCode>;
    fn blob_get_and_remove(&self, alias: &str) -> Result<NativeBuffer, ErrorCode>;

    // integer
    fn int_put(&self, alias: &str, value: i64, expiry: Expiry) -> ErrorCode;
    fn int_update(&self, alias: &str, value: i64, expiry: Expiry) -> ErrorCode;
    fn int_get(&self, alias: &str) -> Result<i64, ErrorCode>;
    fn int_add(&self, alias: &str, addend: i64) -> Result<i64, ErrorCode>;

    // deque
    fn deque_push_front(&self, alias: &str, content: &[u8]) -> ErrorCode;
    fn deque_push_back(&self, alias: &str, content: &[u8]) -> ErrorCode;
    fn deque_pop_front(&self, alias: &str) -> Result<NativeBuffer, ErrorCode>;
    fn deque_pop_back(&self, alias: &str) -> Result<NativeBuffer, ErrorCode>;
    fn deque_front(&self, alias: &str) -> Result<NativeBuffer, ErrorCode>;
    fn deque_back(&self, alias: &str) -> Result<NativeBuffer, ErrorCode>;
    fn deque_size(&self, alias: &str) -> Result<u64, ErrorCode>;
    fn deque_get_at(&self, alias: &str, index: i64) -> Result<NativeBuffer, ErrorCode>;
    fn deque_set_at(&self, alias: &str, index: i64, content: &[u8]) -> ErrorCode;

    // hset
    fn hset_insert(&self, alias: &str, content: &[u8]) -> ErrorCode;
    fn hset_erase(&self, alias: &str, content: &[u8]) -> ErrorCode;
    fn hset_contains(&self, alias: &str, content: &[u8]) -> ErrorCode;

    // lookups
    fn tag_entries(&self, tag: &str) -> Result<NativeArray<String>, ErrorCode>;
    fn prefix_entries(&self, prefix: &str, max_count: i64) -> Result<NativeArray<String>, ErrorCode>;
    fn suffix_entries(&self, suffix: &str, max_count: i64) -> Result<NativeArray<String>, ErrorCode>;
    /// 中身に `pattern` を含む blob の alias
    fn blob_scan(&self, pattern: &str, max_count: i64) -> Result<NativeArray<String>, ErrorCode>;
    /// 中身が正規表現 `pattern` に一致する blob の alias
    fn blob_scan_regex(&self, pattern: &str, max_count: i64) -> Result<NativeArray<String>, ErrorCode>;

    // time series
    fn ts_create(&self, alias: &str, columns: &[ColumnInfo]) -> ErrorCode;
    fn ts_insert_columns(&self, alias: &str, columns: &[ColumnInfo]) -> ErrorCode;
    fn ts_list_columns(&self, alias: &str) -> Result<NativeArray<ColumnInfo>, ErrorCode>;
    fn ts_insert(&self, alias: &str, column: &str, points: &[Point]) -> ErrorCode;
    fn ts_get_ranges(
        &self,
        alias: &str,
        column: &str,
        column_type: ColumnType,
        ranges: &[TsRange],
    ) -> Result<NativeArray<Point>, ErrorCode>;
    fn ts_aggregate(
        &self,
        alias: &str,
        column: &str,
        column_type: ColumnType,
        aggregations: &[Aggregation],
    ) -> Result<Vec<AggregationResult>, ErrorCode>;
    fn ts_erase_ranges(
        &self,
        alias: &str,
        column: &str,
        column_type: ColumnType,
        ranges: &[TsRange],
    ) -> Result<u64, ErrorCode>;

    // query
    fn query(&self, text: &str) -> Result<QueryResult, ErrorCode>;
    fn query_find(&self, text: &str) -> Result<NativeArray<String>, ErrorCode>;
}
