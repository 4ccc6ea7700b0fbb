//! TimeSeries - column の集まり
//!
//! create / insertColumns は成功すると渡した column 定義をそのまま返します。
//! column entity は同期的に作るだけで、存在確認はしません。

use crate::app::binder::Shape;
use crate::app::dispatcher::Dispatcher;
use crate::app::marshal::ColumnInfoArrayResult;
use crate::domain::buffer::NativeArray;
use crate::domain::errors::{BindError, ErrorCode};
use crate::domain::ids::TaskId;
use crate::domain::series::ColumnInfo;
use crate::domain::task::Output;
use crate::domain::value::Value;

use super::column::{
    BlobColumn, Column, ColumnKind, DoubleColumn, Int64Column, StringColumn, SymbolColumn, TimestampColumn,
};
use super::entity::{Entity, EntityRef};
use super::entry::{Entry, entry_methods};
use super::registry::{EntityKind, Method};

#[derive(Debug, Clone)]
pub struct TimeSeries {
    base: EntityRef,
}

impl Entity for TimeSeries {
    fn base(&self) -> &EntityRef {
        &self.base
    }
}

impl Entry for TimeSeries {}

fn echo(code: ErrorCode, columns: &[ColumnInfo]) -> Result<Output, ErrorCode> {
    if code.is_success() {
        Ok(Output::Columns(NativeArray::owned(columns.to_vec())))
    } else {
        Err(code)
    }
}

impl TimeSeries {
    /// `create(columnInfos, callback(error, columns))`
    pub fn create(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<ColumnInfoArrayResult, _>(dispatcher, args, Shape::Columns, |s, t| {
            let columns = t.input.columns()?;
            echo(s.ts_create(&t.alias, columns), columns)
        })
    }

    pub fn insert_columns(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<ColumnInfoArrayResult, _>(dispatcher, args, Shape::Columns, |s, t| {
            let columns = t.input.columns()?;
            echo(s.ts_insert_columns(&t.alias, columns), columns)
        })
    }

    pub fn columns(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<ColumnInfoArrayResult, _>(dispatcher, args, Shape::None, |s, t| {
            s.ts_list_columns(&t.alias).map(Output::Columns)
        })
    }

    pub fn column<K: ColumnKind>(&self, name: impl Into<String>) -> Column<K> {
        let base = EntityRef::new(name, self.connection().clone()).with_holder(self.alias());
        Column::from_ref(base)
    }

    pub fn double_column(&self, name: impl Into<String>) -> DoubleColumn {
        self.column(name)
    }

    pub fn blob_column(&self, name: impl Into<String>) -> BlobColumn {
        self.column(name)
    }

    pub fn int64_column(&self, name: impl Into<String>) -> Int64Column {
        self.column(name)
    }

    pub fn timestamp_column(&self, name: impl Into<String>) -> TimestampColumn {
        self.column(name)
    }

    pub fn string_column(&self, name: impl Into<String>) -> StringColumn {
        self.column(name)
    }

    pub fn symbol_column(&self, name: impl Into<String>) -> SymbolColumn {
        self.column(name)
    }
}

impl EntityKind for TimeSeries {
    const KIND: &'static str = "ts";

    fn from_ref(base: EntityRef) -> Self {
        Self { base }
    }

    fn methods() -> Vec<Method<Self>> {
        let mut methods = vec![
            Method::new("create", Self::create),
            Method::new("insertColumns", Self::insert_columns),
            Method::new("columns", Self::columns),
        ];
        methods.extend(entry_methods::<Self>());
        methods
    }
}
