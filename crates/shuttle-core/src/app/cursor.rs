//! ArgsEater - 位置引数の型付き取り出し
//!
//! `eat_*` は次の引数の動的型を見て、合えば値を返して一つ進みます。
//! 合わなければ `None` を返し、位置は変わりません。
//!
//! 配列を取る `eat_*` は `Composite` を返します。
//! - `Missing`: 次の引数が配列ではない
//! - `Malformed { index }`: 配列だが `index` 番目の要素が不正
//! - `Items(vec)`: 全要素が正しい（空もありうる）
//!
//! `Missing` と `Malformed` では位置は進みません。

use chrono::{DateTime, Utc};

use crate::domain::errors::BindError;
use crate::domain::series::{Aggregation, AggregationType, ColumnInfo, ColumnType, Point, PointValue};
use crate::domain::time::{Expiry, Timespec, TsRange};
use crate::domain::value::{Callback, Value};

/// 配列引数の取り出し結果
#[derive(Debug, PartialEq)]
pub enum Composite<T> {
    Missing,
    Malformed { index: usize },
    Items(Vec<T>),
}

impl<T> Composite<T> {
    /// 空配列も許す
    pub fn into_list(self, position: usize, expected: &'static str) -> Result<Vec<T>, BindError> {
        match self {
            Composite::Missing => Err(BindError::InvalidArgument { position, expected }),
            Composite::Malformed { index } => Err(BindError::MalformedElement {
                position,
                index,
                expected,
            }),
            Composite::Items(items) => Ok(items),
        }
    }

    /// 一件以上必要
    pub fn into_non_empty(self, position: usize, expected: &'static str) -> Result<Vec<T>, BindError> {
        let items = self.into_list(position, expected)?;
        if items.is_empty() {
            return Err(BindError::EmptyList { position, expected });
        }
        Ok(items)
    }
}

pub struct ArgsEater {
    args: Vec<Value>,
    position: usize,
}

impl ArgsEater {
    pub fn new(args: Vec<Value>) -> Self {
        Self { args, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// まだ食べていない引数の数
    pub fn remaining(&self) -> usize {
        self.args.len() - self.position
    }

    pub fn peek(&self) -> Option<&Value> {
        self.args.get(self.position)
    }

    fn eat_with<T>(&mut self, convert: impl FnOnce(&mut Value) -> Option<T>) -> Option<T> {
        let slot = self.args.get_mut(self.position)?;
        let out = convert(slot)?;
        self.position += 1;
        Some(out)
    }

    fn eat_array<T>(&mut self, convert: impl Fn(&Value) -> Option<T>) -> Composite<T> {
        let Some(Value::Array(items)) = self.args.get(self.position) else {
            return Composite::Missing;
        };
        let mut out = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match convert(item) {
                Some(v) => out.push(v),
                None => return Composite::Malformed { index },
            }
        }
        self.position += 1;
        Composite::Items(out)
    }

    pub fn eat_string(&mut self) -> Option<String> {
        self.eat_with(|v| match v {
            Value::String(s) => Some(std::mem::take(s)),
            _ => None,
        })
    }

    pub fn eat_number(&mut self) -> Option<f64> {
        self.eat_with(|v| v.as_f64())
    }

    /// 整数値の number のみ
    pub fn eat_integer(&mut self) -> Option<i64> {
        self.eat_with(|v| v.as_f64().and_then(integral))
    }

    /// buffer の中身を取り出す。ネイティブ由来ならここで release される
    pub fn eat_buffer(&mut self) -> Option<Vec<u8>> {
        self.eat_with(|v| match v {
            Value::Buffer(_) => match std::mem::take(v) {
                Value::Buffer(buf) => Some(buf.into_vec()),
                _ => None,
            },
            _ => None,
        })
    }

    pub fn eat_date(&mut self) -> Option<DateTime<Utc>> {
        self.eat_with(|v| match v {
            Value::Date(at) => Some(*at),
            _ => None,
        })
    }

    /// Date か、特殊数値 `NEVER_EXPIRES` / `PRESERVE_EXPIRATION`
    pub fn eat_expiry(&mut self) -> Option<Expiry> {
        self.eat_with(|v| match v {
            Value::Date(at) => Some(Expiry::At(*at)),
            Value::Number(n) => integral(*n).and_then(Expiry::from_special),
            _ => None,
        })
    }

    pub fn eat_callback(&mut self) -> Option<Callback> {
        self.eat_with(|v| match v {
            Value::Function(_) => match std::mem::take(v) {
                Value::Function(cb) => Some(cb),
                _ => None,
            },
            _ => None,
        })
    }

    /// 末尾の引数が関数なら取り外す
    pub fn eat_trailing_callback(&mut self) -> Option<Callback> {
        if self.args.len() <= self.position || !matches!(self.args.last(), Some(Value::Function(_))) {
            return None;
        }
        match self.args.pop() {
            Some(Value::Function(cb)) => Some(cb),
            _ => None,
        }
    }

    pub fn eat_string_list(&mut self) -> Composite<String> {
        self.eat_array(|v| v.as_str().map(str::to_string))
    }

    /// `{timestamp, value}` の配列。value は column 型に合っている必要がある
    pub fn eat_points(&mut self, column_type: ColumnType) -> Composite<Point> {
        self.eat_array(|v| {
            let timestamp = v.get("timestamp").and_then(timespec)?;
            let value = point_value(v.get("value")?, column_type)?;
            Some(Point::new(timestamp, value))
        })
    }

    pub fn eat_ranges(&mut self) -> Composite<TsRange> {
        self.eat_array(|v| match v {
            Value::Range(r) => Some(*r),
            _ => None,
        })
    }

    /// `{name: string, type: number, symtable?: string}` の配列
    pub fn eat_column_infos(&mut self) -> Composite<ColumnInfo> {
        self.eat_array(|v| {
            let name = v.get("name")?.as_str()?;
            let column_type = v
                .get("type")?
                .as_f64()
                .and_then(integral)
                .and_then(ColumnType::from_number)?;
            let symtable = match v.get("symtable") {
                None | Some(Value::Undefined) => None,
                Some(s) => Some(s.as_str()?.to_string()),
            };
            Some(ColumnInfo {
                name: name.to_string(),
                column_type,
                symtable,
            })
        })
    }

    /// `{type: number, range: Range}` の配列
    pub fn eat_aggregations(&mut self) -> Composite<Aggregation> {
        self.eat_array(|v| {
            let kind = v
                .get("type")?
                .as_f64()
                .and_then(integral)
                .and_then(AggregationType::from_number)?;
            let range = match v.get("range")? {
                Value::Range(r) => *r,
                _ => return None,
            };
            Some(Aggregation { kind, range })
        })
    }
}

fn integral(n: f64) -> Option<i64> {
    (n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64)
        .then_some(n as i64)
}

fn timespec(v: &Value) -> Option<Timespec> {
    match v {
        Value::Timestamp(ts) => Some(*ts),
        Value::Date(at) => Some(Timespec::from(*at)),
        _ => None,
    }
}

fn point_value(v: &Value, column_type: ColumnType) -> Option<PointValue> {
    match column_type {
        ColumnType::Double => v.as_f64().map(PointValue::Double),
        ColumnType::Int64 => v.as_f64().and_then(integral).map(PointValue::Int64),
        ColumnType::Blob => v.as_bytes().map(|b| PointValue::Blob(b.to_vec())),
        ColumnType::String | ColumnType::Symbol => v.as_str().map(|s| PointValue::String(s.to_string())),
        ColumnType::Timestamp => timespec(v).map(PointValue::Timestamp),
    }
}
