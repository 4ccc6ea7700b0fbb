//! Cluster - 接続と entity の入り口
//!
//! entity は全てここで作られ、同じ `ConnectionHandle` を共有します。
//! 接続前に作った entity も、接続後はそのまま使えます。

use std::sync::Arc;

use crate::domain::errors::{BindError, QdbError};
use crate::domain::ids::TaskId;
use crate::domain::task::Output;
use crate::domain::value::{Callback, Value};
use crate::ports::NativeConnector;
use crate::typed::{
    Blob, Column, ColumnKind, Deque, DynEntity, EntityKind, EntityRef, HSet, Integer, KindRegistry, Prefix, Query,
    QueryFind, Range, RegistryError, Suffix, Tag, TimeSeries,
};

use super::connection::ConnectionHandle;
use super::cursor::ArgsEater;
use super::descriptor::TaskDescriptor;
use super::dispatcher::Dispatcher;
use super::marshal::VoidResult;

pub struct Cluster {
    connection: Arc<ConnectionHandle>,
    connector: Arc<dyn NativeConnector>,
}

impl Cluster {
    pub fn new(connection: Arc<ConnectionHandle>, connector: Arc<dyn NativeConnector>) -> Self {
        Self { connection, connector }
    }

    pub fn connection(&self) -> &Arc<ConnectionHandle> {
        &self.connection
    }

    /// `connect(onSuccess(), onError(error))`
    ///
    /// 接続は worker で行い、結果に応じてどちらか一方だけが呼ばれます。
    pub fn connect(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        let mut eater = ArgsEater::new(args);
        let on_success = eater.eat_callback().ok_or(BindError::InvalidArgument {
            position: 0,
            expected: "function",
        })?;
        let on_error = eater.eat_callback().ok_or(BindError::InvalidArgument {
            position: 1,
            expected: "function",
        })?;
        if eater.remaining() > 0 {
            return Err(BindError::UnexpectedArgument {
                position: eater.position(),
            });
        }

        let callback = Callback::new(move |argv| match argv.into_iter().next() {
            Some(Value::Error(error)) => on_error.call(vec![Value::Error(error)]),
            _ => on_success.call(Vec::new()),
        });

        let connector = Arc::clone(&self.connector);
        let task = TaskDescriptor::new(
            dispatcher.next_task_id(),
            self.connection.uri(),
            Arc::clone(&self.connection),
        );
        Ok(dispatcher.queue_raw::<VoidResult, _>(
            task,
            move |t| {
                let result = t.connection.connect(&*connector);
                if let Err(code) = &result {
                    tracing::error!(connection = %t.connection.id(), uri = %t.alias, error = %code, "connect failed");
                }
                t.resolve(result.map(|()| Output::None));
            },
            callback,
        ))
    }

    /// 現在の timeout（ミリ秒）
    pub fn get_timeout(&self) -> u32 {
        self.connection.timeout()
    }

    /// 1000ms 未満は `INVALID_ARGUMENT`
    pub fn set_timeout(&self, timeout_ms: u32) -> Result<(), QdbError> {
        self.connection.set_timeout(timeout_ms).map_err(QdbError::new)
    }

    fn entity_ref(&self, alias: impl Into<String>) -> EntityRef {
        EntityRef::new(alias, Arc::clone(&self.connection))
    }

    pub fn entity_of<E: EntityKind>(&self, alias: impl Into<String>) -> E {
        E::from_ref(self.entity_ref(alias))
    }

    pub fn blob(&self, alias: impl Into<String>) -> Blob {
        self.entity_of(alias)
    }

    pub fn integer(&self, alias: impl Into<String>) -> Integer {
        self.entity_of(alias)
    }

    pub fn deque(&self, alias: impl Into<String>) -> Deque {
        self.entity_of(alias)
    }

    pub fn hset(&self, alias: impl Into<String>) -> HSet {
        self.entity_of(alias)
    }

    pub fn tag(&self, name: impl Into<String>) -> Tag {
        self.entity_of(name)
    }

    pub fn prefix(&self, prefix: impl Into<String>) -> Prefix {
        self.entity_of(prefix)
    }

    pub fn suffix(&self, suffix: impl Into<String>) -> Suffix {
        self.entity_of(suffix)
    }

    pub fn ts(&self, alias: impl Into<String>) -> TimeSeries {
        self.entity_of(alias)
    }

    pub fn query(&self, text: impl Into<String>) -> Query {
        self.entity_of(text)
    }

    pub fn query_find(&self, text: impl Into<String>) -> QueryFind {
        self.entity_of(text)
    }

    /// blob の中身を検索する entity。alias は持たない
    pub fn range(&self) -> Range {
        self.entity_of("")
    }

    pub fn column<K: ColumnKind>(&self, time_series: impl Into<String>, name: impl Into<String>) -> Column<K> {
        Column::from_ref(self.entity_ref(name).with_holder(time_series))
    }

    /// kind 名で entity を作る
    pub fn entity(
        &self,
        registry: &KindRegistry,
        kind: &str,
        alias: impl Into<String>,
    ) -> Result<Box<dyn DynEntity>, RegistryError> {
        registry.create(kind, self.entity_ref(alias))
    }

    /// kind 名で column を作る。`kind` は `column_double` などの column kind
    pub fn column_entity(
        &self,
        registry: &KindRegistry,
        kind: &str,
        time_series: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Box<dyn DynEntity>, RegistryError> {
        registry.create(kind, self.entity_ref(name).with_holder(time_series))
    }
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster").field("connection", &self.connection).finish()
    }
}
