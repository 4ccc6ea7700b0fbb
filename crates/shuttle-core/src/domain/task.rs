//! Input / Output - タスクが運ぶ入力と結果のペイロード

use super::buffer::{NativeArray, NativeBuffer};
use super::errors::ErrorCode;
use super::metadata::{EntryMetadata, EntryType};
use super::query::QueryResult;
use super::series::{Aggregation, AggregationResult, ColumnInfo, Point};
use super::time::TsRange;

/// Input は呼び出しごとの入力ペイロード
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Input {
    #[default]
    None,
    Integer(i64),
    String(String),
    Strings(Vec<String>),
    Bytes(Vec<u8>),
    Points(Vec<Point>),
    Ranges(Vec<TsRange>),
    Columns(Vec<ColumnInfo>),
    Aggregations(Vec<Aggregation>),
    /// deque の位置指定書き込み
    Indexed { index: i64, content: Vec<u8> },
    /// blob の中身の検索
    Scan { pattern: String, max_count: i64 },
}

// body は binder が詰めた variant を前提にする。食い違いは内部エラー
impl Input {
    pub fn integer(&self) -> Result<i64, ErrorCode> {
        match self {
            Input::Integer(n) => Ok(*n),
            _ => Err(ErrorCode::INTERNAL_LOCAL),
        }
    }

    pub fn string(&self) -> Result<&str, ErrorCode> {
        match self {
            Input::String(s) => Ok(s),
            _ => Err(ErrorCode::INTERNAL_LOCAL),
        }
    }

    pub fn strings(&self) -> Result<&[String], ErrorCode> {
        match self {
            Input::Strings(items) => Ok(items),
            _ => Err(ErrorCode::INTERNAL_LOCAL),
        }
    }

    pub fn bytes(&self) -> Result<&[u8], ErrorCode> {
        match self {
            Input::Bytes(b) => Ok(b),
            _ => Err(ErrorCode::INTERNAL_LOCAL),
        }
    }

    pub fn points(&self) -> Result<&[Point], ErrorCode> {
        match self {
            Input::Points(p) => Ok(p),
            _ => Err(ErrorCode::INTERNAL_LOCAL),
        }
    }

    pub fn ranges(&self) -> Result<&[TsRange], ErrorCode> {
        match self {
            Input::Ranges(r) => Ok(r),
            _ => Err(ErrorCode::INTERNAL_LOCAL),
        }
    }

    pub fn columns(&self) -> Result<&[ColumnInfo], ErrorCode> {
        match self {
            Input::Columns(c) => Ok(c),
            _ => Err(ErrorCode::INTERNAL_LOCAL),
        }
    }

    pub fn aggregations(&self) -> Result<&[Aggregation], ErrorCode> {
        match self {
            Input::Aggregations(a) => Ok(a),
            _ => Err(ErrorCode::INTERNAL_LOCAL),
        }
    }

    pub fn indexed(&self) -> Result<(i64, &[u8]), ErrorCode> {
        match self {
            Input::Indexed { index, content } => Ok((*index, content)),
            _ => Err(ErrorCode::INTERNAL_LOCAL),
        }
    }

    pub fn scan(&self) -> Result<(&str, i64), ErrorCode> {
        match self {
            Input::Scan { pattern, max_count } => Ok((pattern, *max_count)),
            _ => Err(ErrorCode::INTERNAL_LOCAL),
        }
    }
}

/// Output は worker が書く結果ペイロード
#[derive(Debug, Default)]
pub enum Output {
    #[default]
    None,
    Buffer(NativeBuffer),
    Integer(i64),
    Unsigned(u64),
    /// 秒単位の時刻。0 以下は「なし」
    Date(i64),
    Strings(NativeArray<String>),
    Metadata(EntryMetadata),
    EntryType(EntryType),
    TagBatch {
        success_count: usize,
        results: Vec<(String, bool)>,
    },
    Points(NativeArray<Point>),
    Aggregations(Vec<AggregationResult>),
    Columns(NativeArray<ColumnInfo>),
    Table(QueryResult),
}
