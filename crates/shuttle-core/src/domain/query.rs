//! Query 結果（table 形式）

use super::time::Timespec;

/// QueryCell は結果 table の 1 セル
#[derive(Debug, Clone, PartialEq)]
pub enum QueryCell {
    Empty,
    Double(f64),
    Blob(Vec<u8>),
    Int64(i64),
    Timestamp(Timespec),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<QueryCell>>,
}

impl QueryTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// QueryResult は query 実行結果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    pub tables: Vec<QueryTable>,
    pub scanned_point_count: u64,
    pub error_message: Option<String>,
}
