//! Marshal - 完了したタスクを callback 引数に変換する
//!
//! caller スレッドでのみ実行されます。callback の第 1 引数は常に error で、
//! 成功なら `Null`、失敗なら `Value::Error` です。
//!
//! 失敗時も callback の引数の数は変わらず、結果の位置には型ごとの既定値が入ります。
//! 異常終了したタスクや error slot が未確定のタスクは `INTERNAL_LOCAL` として扱います。

use chrono::DateTime;

use crate::domain::buffer::NativeBuffer;
use crate::domain::errors::{ErrorCode, QdbError};
use crate::domain::metadata::EntryMetadata;
use crate::domain::query::{QueryCell, QueryResult};
use crate::domain::series::{AggregationResult, ColumnInfo, Point, PointValue};
use crate::domain::state::WorkerStatus;
use crate::domain::task::Output;
use crate::domain::value::Value;

use super::descriptor::TaskDescriptor;

/// ResultMarshaler は結果の形ごとの変換規則
pub trait ResultMarshaler {
    /// callback に渡す引数の数（error を含む）
    const ARITY: usize;

    fn marshal(status: &WorkerStatus, task: &mut TaskDescriptor) -> Vec<Value>;
}

/// 呼び出し側から見た最終的な error code
pub fn error_code(status: &WorkerStatus, task: &TaskDescriptor) -> ErrorCode {
    match status {
        WorkerStatus::Abnormal(_) => ErrorCode::INTERNAL_LOCAL,
        WorkerStatus::Finished if !task.error().is_terminal() => ErrorCode::INTERNAL_LOCAL,
        WorkerStatus::Finished => task.error(),
    }
}

pub fn error_value(code: ErrorCode) -> Value {
    if code.is_success() {
        Value::Null
    } else {
        Value::Error(QdbError::new(code))
    }
}

/// 結果配列の確保。確保できなければ `NO_MEMORY_LOCAL`
pub fn reserve<T>(n: usize) -> Result<Vec<T>, ErrorCode> {
    let mut out = Vec::new();
    out.try_reserve_exact(n).map_err(|_| ErrorCode::NO_MEMORY_LOCAL)?;
    Ok(out)
}

/// error + 1 値の共通処理
fn marshal_single(
    status: &WorkerStatus,
    task: &mut TaskDescriptor,
    fallback: fn() -> Value,
    convert: impl FnOnce(Output) -> Result<Value, ErrorCode>,
) -> Vec<Value> {
    let code = error_code(status, task);
    if !code.is_success() {
        return vec![error_value(code), fallback()];
    }
    match convert(task.take_output()) {
        Ok(value) => vec![Value::Null, value],
        Err(code) => vec![error_value(code), fallback()],
    }
}

fn empty_array() -> Value {
    Value::Array(Vec::new())
}

pub struct VoidResult;

impl ResultMarshaler for VoidResult {
    const ARITY: usize = 1;

    fn marshal(status: &WorkerStatus, task: &mut TaskDescriptor) -> Vec<Value> {
        vec![error_value(error_code(status, task))]
    }
}

/// ネイティブ buffer はコピーせず caller に移す
pub struct BufferResult;

impl ResultMarshaler for BufferResult {
    const ARITY: usize = 2;

    fn marshal(status: &WorkerStatus, task: &mut TaskDescriptor) -> Vec<Value> {
        marshal_single(
            status,
            task,
            || Value::Buffer(NativeBuffer::empty()),
            |output| match output {
                Output::Buffer(buf) => Ok(Value::Buffer(buf)),
                _ => Err(ErrorCode::INTERNAL_LOCAL),
            },
        )
    }
}

pub struct IntegerResult;

impl ResultMarshaler for IntegerResult {
    const ARITY: usize = 2;

    fn marshal(status: &WorkerStatus, task: &mut TaskDescriptor) -> Vec<Value> {
        marshal_single(
            status,
            task,
            || Value::Number(0.0),
            |output| match output {
                Output::Integer(n) => Ok(Value::from(n)),
                _ => Err(ErrorCode::INTERNAL_LOCAL),
            },
        )
    }
}

pub struct UnsignedResult;

impl ResultMarshaler for UnsignedResult {
    const ARITY: usize = 2;

    fn marshal(status: &WorkerStatus, task: &mut TaskDescriptor) -> Vec<Value> {
        marshal_single(
            status,
            task,
            || Value::Number(0.0),
            |output| match output {
                Output::Unsigned(n) => Ok(Value::Number(n as f64)),
                _ => Err(ErrorCode::INTERNAL_LOCAL),
            },
        )
    }
}

/// 秒単位の時刻。0 以下は `Undefined`
pub struct DateResult;

impl ResultMarshaler for DateResult {
    const ARITY: usize = 2;

    fn marshal(status: &WorkerStatus, task: &mut TaskDescriptor) -> Vec<Value> {
        marshal_single(
            status,
            task,
            || Value::Undefined,
            |output| match output {
                Output::Date(secs) if secs > 0 => Ok(DateTime::from_timestamp(secs, 0)
                    .map(Value::Date)
                    .unwrap_or(Value::Undefined)),
                Output::Date(_) => Ok(Value::Undefined),
                _ => Err(ErrorCode::INTERNAL_LOCAL),
            },
        )
    }
}

pub struct StringArrayResult;

impl ResultMarshaler for StringArrayResult {
    const ARITY: usize = 2;

    fn marshal(status: &WorkerStatus, task: &mut TaskDescriptor) -> Vec<Value> {
        marshal_single(status, task, empty_array, |output| match output {
            Output::Strings(native) => {
                let mut out = reserve(native.len())?;
                out.extend(native.iter().map(|s| Value::String(s.clone())));
                Ok(Value::Array(out))
            }
            _ => Err(ErrorCode::INTERNAL_LOCAL),
        })
    }
}

pub struct EntryMetadataResult;

impl ResultMarshaler for EntryMetadataResult {
    const ARITY: usize = 2;

    fn marshal(status: &WorkerStatus, task: &mut TaskDescriptor) -> Vec<Value> {
        marshal_single(
            status,
            task,
            || Value::Undefined,
            |output| match output {
                Output::Metadata(meta) => Ok(metadata_value(&meta)),
                _ => Err(ErrorCode::INTERNAL_LOCAL),
            },
        )
    }
}

fn metadata_value(meta: &EntryMetadata) -> Value {
    let reference = meta.reference.0.iter().map(|w| Value::Number(*w as f64)).collect();
    let mut fields = vec![
        ("reference", Value::Array(reference)),
        ("type", Value::from(meta.entry_type.as_number())),
        ("size", Value::Number(meta.size as f64)),
        ("modification_time", date_value(meta.modification_time.to_datetime())),
    ];
    if let Some(expiry) = meta.expiry_time {
        fields.push(("expiry_time", date_value(expiry.to_datetime())));
    }
    Value::object(fields)
}

fn date_value(at: Option<chrono::DateTime<chrono::Utc>>) -> Value {
    at.map(Value::Date).unwrap_or(Value::Undefined)
}

pub struct EntryTypeResult;

impl ResultMarshaler for EntryTypeResult {
    const ARITY: usize = 2;

    fn marshal(status: &WorkerStatus, task: &mut TaskDescriptor) -> Vec<Value> {
        marshal_single(
            status,
            task,
            || Value::Number(-1.0),
            |output| match output {
                Output::EntryType(t) => Ok(Value::from(t.as_number())),
                _ => Err(ErrorCode::INTERNAL_LOCAL),
            },
        )
    }
}

/// (error, success_count, {tag: bool})
pub struct TagBatchResult;

impl ResultMarshaler for TagBatchResult {
    const ARITY: usize = 3;

    fn marshal(status: &WorkerStatus, task: &mut TaskDescriptor) -> Vec<Value> {
        let code = error_code(status, task);
        let output = if code.is_success() {
            task.take_output()
        } else {
            Output::None
        };
        match output {
            Output::TagBatch {
                success_count,
                results,
            } => {
                let flags = results.into_iter().map(|(tag, set)| (tag, Value::Bool(set)));
                vec![
                    error_value(code),
                    Value::Number(success_count as f64),
                    Value::object(flags),
                ]
            }
            _ => {
                let code = if code.is_success() { ErrorCode::INTERNAL_LOCAL } else { code };
                vec![
                    error_value(code),
                    Value::Number(0.0),
                    Value::object(Vec::<(String, Value)>::new()),
                ]
            }
        }
    }
}

pub struct TableResult;

impl ResultMarshaler for TableResult {
    const ARITY: usize = 2;

    fn marshal(status: &WorkerStatus, task: &mut TaskDescriptor) -> Vec<Value> {
        marshal_single(
            status,
            task,
            || Value::Undefined,
            |output| match output {
                Output::Table(result) => table_value(result),
                _ => Err(ErrorCode::INTERNAL_LOCAL),
            },
        )
    }
}

fn table_value(result: QueryResult) -> Result<Value, ErrorCode> {
    let mut tables = reserve(result.tables.len())?;
    let tables_count = result.tables.len();
    for table in result.tables {
        let columns_count = table.columns.len();
        let rows_count = table.row_count();
        let mut rows = reserve(rows_count)?;
        for row in table.rows {
            rows.push(Value::Array(row.into_iter().map(cell_value).collect()));
        }
        tables.push(Value::object([
            ("table_name", Value::String(table.name)),
            ("columns_count", Value::Number(columns_count as f64)),
            (
                "columns_names",
                Value::Array(table.columns.into_iter().map(Value::String).collect()),
            ),
            ("rows_count", Value::Number(rows_count as f64)),
            ("rows", Value::Array(rows)),
        ]));
    }

    let mut fields = vec![
        ("scanned_point_count", Value::Number(result.scanned_point_count as f64)),
        ("tables_count", Value::Number(tables_count as f64)),
        ("tables", Value::Array(tables)),
    ];
    if let Some(message) = result.error_message {
        fields.push(("error_message", Value::String(message)));
    }
    Ok(Value::object(fields))
}

fn cell_value(cell: QueryCell) -> Value {
    match cell {
        QueryCell::Empty => Value::Null,
        QueryCell::Double(d) => Value::Number(d),
        QueryCell::Blob(b) => Value::buffer(b),
        QueryCell::Int64(n) => Value::from(n),
        QueryCell::Timestamp(ts) => Value::Timestamp(ts),
        QueryCell::String(s) => Value::String(s),
    }
}

/// [{timestamp, value}]
pub struct PointArrayResult;

impl ResultMarshaler for PointArrayResult {
    const ARITY: usize = 2;

    fn marshal(status: &WorkerStatus, task: &mut TaskDescriptor) -> Vec<Value> {
        marshal_single(status, task, empty_array, |output| match output {
            Output::Points(native) => {
                let mut out = reserve(native.len())?;
                out.extend(native.iter().map(point_value));
                Ok(Value::Array(out))
            }
            _ => Err(ErrorCode::INTERNAL_LOCAL),
        })
    }
}

fn point_value(point: &Point) -> Value {
    let value = match &point.value {
        PointValue::Double(d) => Value::Number(*d),
        PointValue::Blob(b) => Value::buffer(b.clone()),
        PointValue::Int64(n) => Value::from(*n),
        PointValue::Timestamp(ts) => Value::Timestamp(*ts),
        PointValue::String(s) => Value::String(s.clone()),
    };
    Value::object([("timestamp", Value::Timestamp(point.timestamp)), ("value", value)])
}

/// [{type, range, count, result}]
pub struct AggregateArrayResult;

impl ResultMarshaler for AggregateArrayResult {
    const ARITY: usize = 2;

    fn marshal(status: &WorkerStatus, task: &mut TaskDescriptor) -> Vec<Value> {
        marshal_single(status, task, empty_array, |output| match output {
            Output::Aggregations(results) => {
                let mut out = reserve(results.len())?;
                out.extend(results.iter().map(aggregation_value));
                Ok(Value::Array(out))
            }
            _ => Err(ErrorCode::INTERNAL_LOCAL),
        })
    }
}

fn aggregation_value(agg: &AggregationResult) -> Value {
    Value::object([
        ("type", Value::from(agg.kind.as_number())),
        ("range", Value::Range(agg.range)),
        ("count", Value::Number(agg.count as f64)),
        ("result", agg.result.as_ref().map(point_value).unwrap_or(Value::Undefined)),
    ])
}

/// [{name, type, symtable?}]
pub struct ColumnInfoArrayResult;

impl ResultMarshaler for ColumnInfoArrayResult {
    const ARITY: usize = 2;

    fn marshal(status: &WorkerStatus, task: &mut TaskDescriptor) -> Vec<Value> {
        marshal_single(status, task, empty_array, |output| match output {
            Output::Columns(native) => {
                let mut out = reserve(native.len())?;
                out.extend(native.iter().map(column_value));
                Ok(Value::Array(out))
            }
            _ => Err(ErrorCode::INTERNAL_LOCAL),
        })
    }
}

fn column_value(column: &ColumnInfo) -> Value {
    let mut fields = vec![
        ("name", Value::String(column.name.clone())),
        ("type", Value::from(column.column_type.as_number())),
    ];
    if let Some(symtable) = &column.symtable {
        fields.push(("symtable", Value::String(symtable.clone())));
    }
    Value::object(fields)
}
