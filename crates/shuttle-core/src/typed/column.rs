//! Column - time-series の 1 列
//!
//! column は所有する time-series の alias を holder として持ちます。
//! `Entity` だけを実装し、削除やタグ付けはできません。
//! 値型は marker 型 `K: ColumnKind` で静的に決まります。

use std::fmt;
use std::marker::PhantomData;

use crate::app::binder::Shape;
use crate::app::descriptor::TaskDescriptor;
use crate::app::dispatcher::Dispatcher;
use crate::app::marshal::{AggregateArrayResult, PointArrayResult, UnsignedResult, VoidResult};
use crate::domain::errors::{BindError, ErrorCode};
use crate::domain::ids::TaskId;
use crate::domain::series::ColumnType;
use crate::domain::task::Output;
use crate::domain::value::Value;

use super::entity::{Entity, EntityRef, status};
use super::registry::{EntityKind, Method};

pub trait ColumnKind: 'static {
    const TYPE: ColumnType;
    const KIND: &'static str;
}

macro_rules! column_kind {
    ($marker:ident, $column_type:expr, $kind:literal) => {
        #[derive(Debug, Clone, Copy)]
        pub struct $marker;

        impl ColumnKind for $marker {
            const TYPE: ColumnType = $column_type;
            const KIND: &'static str = $kind;
        }
    };
}

column_kind!(DoubleKind, ColumnType::Double, "column_double");
column_kind!(BlobKind, ColumnType::Blob, "column_blob");
column_kind!(Int64Kind, ColumnType::Int64, "column_int64");
column_kind!(TimestampKind, ColumnType::Timestamp, "column_timestamp");
column_kind!(StringKind, ColumnType::String, "column_string");
column_kind!(SymbolKind, ColumnType::Symbol, "column_symbol");

pub type DoubleColumn = Column<DoubleKind>;
pub type BlobColumn = Column<BlobKind>;
pub type Int64Column = Column<Int64Kind>;
pub type TimestampColumn = Column<TimestampKind>;
pub type StringColumn = Column<StringKind>;
pub type SymbolColumn = Column<SymbolKind>;

pub struct Column<K: ColumnKind> {
    base: EntityRef,
    _kind: PhantomData<K>,
}

impl<K: ColumnKind> Clone for Column<K> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: ColumnKind> fmt::Debug for Column<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.base.alias)
            .field("time_series", &self.base.holder)
            .field("type", &K::TYPE)
            .finish()
    }
}

impl<K: ColumnKind> Entity for Column<K> {
    fn base(&self) -> &EntityRef {
        &self.base
    }
}

fn time_series(task: &TaskDescriptor) -> Result<&str, ErrorCode> {
    task.holder.as_deref().ok_or(ErrorCode::INVALID_ARGUMENT)
}

impl<K: ColumnKind> Column<K> {
    pub fn column_type(&self) -> ColumnType {
        K::TYPE
    }

    /// `insert(points, callback(error))`。point は `{timestamp, value}`
    pub fn insert(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<VoidResult, _>(dispatcher, args, Shape::Points(K::TYPE), |s, t| {
            status(s.ts_insert(time_series(t)?, &t.alias, t.input.points()?))
        })
    }

    pub fn ranges(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<PointArrayResult, _>(dispatcher, args, Shape::Ranges, |s, t| {
            s.ts_get_ranges(time_series(t)?, &t.alias, K::TYPE, t.input.ranges()?)
                .map(Output::Points)
        })
    }

    pub fn aggregate(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<AggregateArrayResult, _>(dispatcher, args, Shape::Aggregations, |s, t| {
            s.ts_aggregate(time_series(t)?, &t.alias, K::TYPE, t.input.aggregations()?)
                .map(Output::Aggregations)
        })
    }

    /// 消した point の数を返す
    pub fn erase(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<UnsignedResult, _>(dispatcher, args, Shape::Ranges, |s, t| {
            s.ts_erase_ranges(time_series(t)?, &t.alias, K::TYPE, t.input.ranges()?)
                .map(Output::Unsigned)
        })
    }
}

impl<K: ColumnKind> EntityKind for Column<K> {
    const KIND: &'static str = K::KIND;

    fn from_ref(base: EntityRef) -> Self {
        Self {
            base,
            _kind: PhantomData,
        }
    }

    fn methods() -> Vec<Method<Self>> {
        vec![
            Method::new("insert", Self::insert),
            Method::new("ranges", Self::ranges),
            Method::new("aggregate", Self::aggregate),
            Method::new("erase", Self::erase),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::AggregationType;
    use crate::domain::time::{Timespec, TsRange};
    use crate::typed::testing::{Harness, error_of};
    use crate::typed::time_series::TimeSeries;

    fn point(ms: i64, value: Value) -> Value {
        Value::object([("timestamp", Value::Timestamp(Timespec::from_millis(ms))), ("value", value)])
    }

    fn all_time() -> Value {
        Value::Array(vec![Value::Range(TsRange::new(
            Timespec::from_millis(0),
            Timespec::from_millis(1_000_000),
        ))])
    }

    async fn series(h: &Harness) -> TimeSeries {
        let ts = TimeSeries::from_ref(h.entity_ref("ts"));
        let columns = Value::Array(vec![
            Value::object([("name", Value::from("d")), ("type", Value::from(ColumnType::Double.as_number()))]),
            Value::object([("name", Value::from("s")), ("type", Value::from(ColumnType::String.as_number()))]),
        ]);
        let argv = h.call(vec![columns], |d, a| ts.create(d, a)).await;
        assert_eq!(argv[0], Value::Null);
        ts
    }

    #[tokio::test]
    async fn insert_then_ranges_returns_the_point() {
        let h = Harness::connected();
        let ts = series(&h).await;
        let col = ts.double_column("d");

        let argv = h.call(vec![Value::Array(vec![point(1000, Value::from(1.5))])], |d, a| col.insert(d, a)).await;
        assert_eq!(argv, vec![Value::Null]);

        let argv = h.call(vec![all_time()], |d, a| col.ranges(d, a)).await;
        assert_eq!(argv[0], Value::Null);
        let points = argv[1].as_array().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].get("value"), Some(&Value::Number(1.5)));
        assert_eq!(points[0].get("timestamp"), Some(&Value::Timestamp(Timespec::from_millis(1000))));
        // native 配列はコピー後に解放済み
        assert_eq!(h.cluster.outstanding_allocations(), 0);
    }

    #[tokio::test]
    async fn aggregate_and_erase() {
        let h = Harness::connected();
        let ts = series(&h).await;
        let col = ts.double_column("d");
        let points = Value::Array(vec![point(10, Value::from(2.0)), point(20, Value::from(3.0))]);
        h.call(vec![points], |d, a| col.insert(d, a)).await;

        let range = TsRange::new(Timespec::from_millis(0), Timespec::from_millis(100));
        let aggs = Value::Array(vec![Value::object([
            ("type", Value::from(AggregationType::Sum.as_number())),
            ("range", Value::Range(range)),
        ])]);
        let argv = h.call(vec![aggs], |d, a| col.aggregate(d, a)).await;
        assert_eq!(argv[0], Value::Null);
        let result = &argv[1].as_array().unwrap()[0];
        assert_eq!(result.get("count"), Some(&Value::Number(2.0)));
        assert_eq!(result.get("result").and_then(|p| p.get("value")), Some(&Value::Number(5.0)));

        let argv = h.call(vec![all_time()], |d, a| col.erase(d, a)).await;
        assert_eq!(argv, vec![Value::Null, Value::Number(2.0)]);
    }

    #[tokio::test]
    async fn wrong_column_type_is_incompatible() {
        let h = Harness::connected();
        let ts = series(&h).await;
        let as_int = ts.column::<Int64Kind>("d");

        let argv = h.call(vec![all_time()], |d, a| as_int.ranges(d, a)).await;
        assert_eq!(error_of(&argv), Some(ErrorCode::INCOMPATIBLE_TYPE));
        assert_eq!(argv[1], Value::Array(vec![]));
    }

    #[tokio::test]
    async fn string_points_must_be_strings() {
        let h = Harness::connected();
        let ts = series(&h).await;
        let col = ts.string_column("s");

        let err = col
            .insert(&h.dispatcher, vec![Value::Array(vec![point(1, Value::from(1.0))]), Value::function(|_| {})])
            .unwrap_err();
        assert_eq!(err, BindError::MalformedElement { position: 0, index: 0, expected: "point" });
    }

    #[tokio::test]
    async fn column_without_time_series_is_invalid() {
        let h = Harness::connected();
        let orphan = DoubleColumn::from_ref(h.entity_ref("d"));

        let argv = h.call(vec![all_time()], |d, a| orphan.ranges(d, a)).await;
        assert_eq!(error_of(&argv), Some(ErrorCode::INVALID_ARGUMENT));
    }
}
