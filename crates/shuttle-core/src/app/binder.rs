//! Binder - 呼び出し引数を型付き入力に束縛する
//!
//! 全ての非同期メソッドは「必須引数 → 任意引数 → callback」の順で引数を受けます。
//! callback は常に最後でなければなりません。
//!
//! 束縛は caller スレッドで同期的に行われ、失敗すれば `BindError` を返します。
//! その場合タスクは作られず、callback も呼ばれません。

use crate::domain::errors::BindError;
use crate::domain::series::ColumnType;
use crate::domain::task::Input;
use crate::domain::time::Expiry;
use crate::domain::value::{Callback, Value};

use super::cursor::ArgsEater;

/// Shape はメソッドごとの引数の形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// callback のみ
    None,
    /// tag 名など
    String,
    /// 一件以上の文字列配列
    Strings,
    Buffer,
    /// buffer と任意の expiry
    BufferExpiry,
    Integer,
    /// 整数と任意の expiry
    IntegerExpiry,
    /// 必須の expiry（Date か特殊数値）
    Expiry,
    /// 相対時間（秒）
    Seconds,
    /// deque の位置
    Index,
    /// deque の位置と buffer
    IndexBuffer,
    /// prefix / suffix 検索の最大件数
    MaxCount,
    /// 検索パターンと最大件数
    Scan,
    Points(ColumnType),
    Ranges,
    Columns,
    Aggregations,
}

/// Bound は束縛済みの入力
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub input: Input,
    pub expiry: Option<Expiry>,
}

impl Bound {
    fn input(input: Input) -> Self {
        Self { input, expiry: None }
    }
}

/// 引数列を `shape` に従って束縛し、末尾の callback と一緒に返す
pub fn bind(args: Vec<Value>, shape: Shape) -> Result<(Bound, Callback), BindError> {
    let mut eater = ArgsEater::new(args);
    let callback = eater.eat_trailing_callback().ok_or(BindError::MissingCallback)?;
    let bound = bind_shape(&mut eater, shape)?;
    if eater.remaining() > 0 {
        return Err(BindError::UnexpectedArgument {
            position: eater.position(),
        });
    }
    Ok((bound, callback))
}

fn bind_shape(eater: &mut ArgsEater, shape: Shape) -> Result<Bound, BindError> {
    let bound = match shape {
        Shape::None => Bound::input(Input::None),
        Shape::String => Bound::input(Input::String(need(eater, ArgsEater::eat_string, "string")?)),
        Shape::Strings => {
            let position = eater.position();
            let items = eater.eat_string_list().into_non_empty(position, "string")?;
            Bound::input(Input::Strings(items))
        }
        Shape::Buffer => Bound::input(Input::Bytes(need(eater, ArgsEater::eat_buffer, "buffer")?)),
        Shape::BufferExpiry => {
            let content = need(eater, ArgsEater::eat_buffer, "buffer")?;
            Bound {
                input: Input::Bytes(content),
                expiry: Some(optional_expiry(eater)?),
            }
        }
        Shape::Integer | Shape::Seconds | Shape::Index | Shape::MaxCount => {
            Bound::input(Input::Integer(need(eater, ArgsEater::eat_integer, "integer")?))
        }
        Shape::IntegerExpiry => {
            let value = need(eater, ArgsEater::eat_integer, "integer")?;
            Bound {
                input: Input::Integer(value),
                expiry: Some(optional_expiry(eater)?),
            }
        }
        Shape::Expiry => Bound {
            input: Input::None,
            expiry: Some(need(eater, ArgsEater::eat_expiry, "date")?),
        },
        Shape::IndexBuffer => {
            let index = need(eater, ArgsEater::eat_integer, "integer")?;
            let content = need(eater, ArgsEater::eat_buffer, "buffer")?;
            Bound::input(Input::Indexed { index, content })
        }
        Shape::Scan => {
            let pattern = need(eater, ArgsEater::eat_string, "string")?;
            let max_count = need(eater, ArgsEater::eat_integer, "integer")?;
            Bound::input(Input::Scan { pattern, max_count })
        }
        Shape::Points(column_type) => {
            let position = eater.position();
            let points = eater.eat_points(column_type).into_non_empty(position, "point")?;
            Bound::input(Input::Points(points))
        }
        Shape::Ranges => {
            let position = eater.position();
            let ranges = eater.eat_ranges().into_non_empty(position, "range")?;
            Bound::input(Input::Ranges(ranges))
        }
        Shape::Columns => {
            let position = eater.position();
            let columns = eater.eat_column_infos().into_non_empty(position, "column info")?;
            Bound::input(Input::Columns(columns))
        }
        Shape::Aggregations => {
            let position = eater.position();
            let aggregations = eater.eat_aggregations().into_non_empty(position, "aggregation")?;
            Bound::input(Input::Aggregations(aggregations))
        }
    };
    Ok(bound)
}

fn need<T>(
    eater: &mut ArgsEater,
    eat: impl FnOnce(&mut ArgsEater) -> Option<T>,
    expected: &'static str,
) -> Result<T, BindError> {
    let position = eater.position();
    eat(eater).ok_or(BindError::InvalidArgument { position, expected })
}

/// 省略時は期限なし。それ以外の値が残っていれば不正
fn optional_expiry(eater: &mut ArgsEater) -> Result<Expiry, BindError> {
    if eater.remaining() == 0 {
        return Ok(Expiry::Never);
    }
    need(eater, ArgsEater::eat_expiry, "date")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::time::{Timespec, TsRange};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn with_callback(mut args: Vec<Value>) -> Vec<Value> {
        args.push(Value::function(|_| {}));
        args
    }

    fn bind_ok(args: Vec<Value>, shape: Shape) -> Bound {
        bind(with_callback(args), shape).map(|(b, _)| b).unwrap()
    }

    fn bind_err(args: Vec<Value>, shape: Shape) -> BindError {
        match bind(args, shape) {
            Ok(_) => panic!("expected bind failure"),
            Err(e) => e,
        }
    }

    #[test]
    fn callback_must_be_last() {
        assert_eq!(bind_err(vec![], Shape::None), BindError::MissingCallback);
        assert_eq!(
            bind_err(vec![Value::function(|_| {}), Value::from("x")], Shape::String),
            BindError::MissingCallback
        );
    }

    #[test]
    fn extra_arguments_are_rejected() {
        assert_eq!(
            bind_err(with_callback(vec![Value::from("a"), Value::from("b")]), Shape::String),
            BindError::UnexpectedArgument { position: 1 }
        );
    }

    #[rstest]
    #[case(Shape::Buffer, vec![Value::from("not a buffer")], 0, "buffer")]
    #[case(Shape::Integer, vec![Value::Number(0.5)], 0, "integer")]
    #[case(Shape::IndexBuffer, vec![Value::from(1i64), Value::from(2i64)], 1, "buffer")]
    #[case(Shape::BufferExpiry, vec![Value::buffer(b"x".to_vec()), Value::from("soon")], 1, "date")]
    #[case(Shape::Scan, vec![], 0, "string")]
    #[case(Shape::Scan, vec![Value::from("pattern")], 1, "integer")]
    fn wrong_argument_type_names_its_position(
        #[case] shape: Shape,
        #[case] args: Vec<Value>,
        #[case] position: usize,
        #[case] expected: &'static str,
    ) {
        assert_eq!(
            bind_err(with_callback(args), shape),
            BindError::InvalidArgument { position, expected }
        );
    }

    #[test]
    fn omitted_expiry_means_never() {
        let bound = bind_ok(vec![Value::buffer(b"x".to_vec())], Shape::BufferExpiry);
        assert_eq!(bound.input, Input::Bytes(b"x".to_vec()));
        assert_eq!(bound.expiry, Some(Expiry::Never));

        let bound = bind_ok(vec![Value::from(4i64), Value::from(-1i64)], Shape::IntegerExpiry);
        assert_eq!(bound.expiry, Some(Expiry::Preserve));
    }

    #[test]
    fn expires_at_takes_a_date() {
        let at = Utc.with_ymd_and_hms(2031, 5, 1, 0, 0, 0).unwrap();
        let bound = bind_ok(vec![Value::Date(at)], Shape::Expiry);
        assert_eq!(bound.expiry, Some(Expiry::At(at)));
    }

    #[test]
    fn tag_lists_must_not_be_empty() {
        assert_eq!(
            bind_err(with_callback(vec![Value::Array(vec![])]), Shape::Strings),
            BindError::EmptyList { position: 0, expected: "string" }
        );
        let bound = bind_ok(vec![Value::Array(vec![Value::from("t"), Value::from("u")])], Shape::Strings);
        assert_eq!(bound.input, Input::Strings(vec!["t".into(), "u".into()]));
    }

    #[test]
    fn missing_max_count_is_a_bind_error() {
        assert_eq!(
            bind_err(with_callback(vec![]), Shape::MaxCount),
            BindError::InvalidArgument { position: 0, expected: "integer" }
        );
    }

    #[test]
    fn scan_takes_pattern_then_max_count() {
        let bound = bind_ok(vec![Value::from("pat"), Value::from(5i64)], Shape::Scan);
        assert_eq!(bound.input, Input::Scan { pattern: "pat".into(), max_count: 5 });
    }

    #[test]
    fn ranges_are_bound_in_order() {
        let r1 = TsRange::new(Timespec::from_millis(0), Timespec::from_millis(10));
        let r2 = TsRange::new(Timespec::from_millis(20), Timespec::from_millis(30));
        let bound = bind_ok(vec![Value::Array(vec![Value::Range(r1), Value::Range(r2)])], Shape::Ranges);
        assert_eq!(bound.input, Input::Ranges(vec![r1, r2]));
    }

    #[test]
    fn malformed_point_reports_its_index() {
        let good = Value::object([
            ("timestamp", Value::Timestamp(Timespec::from_millis(1))),
            ("value", Value::Number(1.0)),
        ]);
        let bad = Value::object([("value", Value::Number(1.0))]);
        assert_eq!(
            bind_err(with_callback(vec![Value::Array(vec![good, bad])]), Shape::Points(ColumnType::Double)),
            BindError::MalformedElement { position: 0, index: 1, expected: "point" }
        );
    }
}
