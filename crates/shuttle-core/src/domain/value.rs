//! Value - caller 側の動的値モデル
//!
//! 呼び出し元ランタイムの値をそのまま表します。引数も callback の結果も
//! `Value` の列としてやり取りします。
//!
//! # Send ではない
//! `Value::Function` は caller スレッド専用の `Callback` を持つため、
//! `Value` は worker スレッドへ渡せません。worker へ渡るのは
//! `TaskDescriptor` に詰め替えた型付きの入力だけです。

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use super::buffer::NativeBuffer;
use super::errors::QdbError;
use super::time::{Timespec, TsRange};

/// Callback は一度だけ呼べる completion handler
pub struct Callback(Box<dyn FnOnce(Vec<Value>)>);

impl Callback {
    pub fn new(f: impl FnOnce(Vec<Value>) + 'static) -> Self {
        Self(Box::new(f))
    }

    /// 呼び出すと消費される
    pub fn call(self, argv: Vec<Value>) {
        (self.0)(argv)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

// 関数同士は比較できない
impl PartialEq for Callback {
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

#[derive(Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Buffer(NativeBuffer),
    Date(DateTime<Utc>),
    Timestamp(Timespec),
    Range(TsRange),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Error(QdbError),
    Function(Callback),
}

impl Value {
    pub fn function(f: impl FnOnce(Vec<Value>) + 'static) -> Self {
        Value::Function(Callback::new(f))
    }

    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn buffer(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Buffer(NativeBuffer::owned(bytes.into()))
    }

    /// 診断メッセージ用の型名
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Buffer(_) => "buffer",
            Value::Date(_) => "date",
            Value::Timestamp(_) => "timestamp",
            Value::Range(_) => "range",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Error(_) => "error",
            Value::Function(_) => "function",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Buffer(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&QdbError> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Object のフィールド。Object 以外や欠落は `None`
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(fields) => fields.get(key),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<QdbError> for Value {
    fn from(e: QdbError) -> Self {
        Value::Error(e)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn callback_is_consumed_on_call() {
        let hits = Rc::new(Cell::new(0));
        let seen = Rc::clone(&hits);
        let cb = Callback::new(move |argv| {
            assert_eq!(argv, vec![Value::Null]);
            seen.set(seen.get() + 1);
        });
        cb.call(vec![Value::Null]);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn functions_never_compare_equal() {
        assert_ne!(Value::function(|_| {}), Value::function(|_| {}));
        assert_eq!(Value::from("a"), Value::String("a".into()));
    }

    #[test]
    fn object_field_lookup() {
        let v = Value::object([("name", Value::from("ts")), ("type", Value::from(0i64))]);
        assert_eq!(v.get("name").and_then(Value::as_str), Some("ts"));
        assert_eq!(v.get("missing"), None);
        assert_eq!(Value::Null.get("name"), None);
    }
}
