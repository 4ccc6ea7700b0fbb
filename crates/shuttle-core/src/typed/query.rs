//! Query / QueryFind - クエリ文字列の実行
//!
//! alias にクエリ文字列そのものを持ちます。

use crate::app::binder::Shape;
use crate::app::dispatcher::Dispatcher;
use crate::app::marshal::{StringArrayResult, TableResult};
use crate::domain::errors::BindError;
use crate::domain::ids::TaskId;
use crate::domain::task::Output;
use crate::domain::value::Value;

use super::entity::{Entity, EntityRef};
use super::registry::{EntityKind, Method};

#[derive(Debug, Clone)]
pub struct Query {
    base: EntityRef,
}

/// `find(...)` 形式。条件に合う alias の一覧を返す
#[derive(Debug, Clone)]
pub struct QueryFind {
    base: EntityRef,
}

impl Entity for Query {
    fn base(&self) -> &EntityRef {
        &self.base
    }
}

impl Entity for QueryFind {
    fn base(&self) -> &EntityRef {
        &self.base
    }
}

impl Query {
    pub fn text(&self) -> &str {
        self.alias()
    }

    /// `run(callback(error, table))`
    pub fn run(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<TableResult, _>(dispatcher, args, Shape::None, |s, t| s.query(&t.alias).map(Output::Table))
    }
}

impl QueryFind {
    pub fn text(&self) -> &str {
        self.alias()
    }

    pub fn run(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<StringArrayResult, _>(dispatcher, args, Shape::None, |s, t| {
            s.query_find(&t.alias).map(Output::Strings)
        })
    }
}

impl EntityKind for Query {
    const KIND: &'static str = "query";

    fn from_ref(base: EntityRef) -> Self {
        Self { base }
    }

    fn methods() -> Vec<Method<Self>> {
        vec![Method::new("run", Self::run)]
    }
}

impl EntityKind for QueryFind {
    const KIND: &'static str = "query_find";

    fn from_ref(base: EntityRef) -> Self {
        Self { base }
    }

    fn methods() -> Vec<Method<Self>> {
        vec![Method::new("run", Self::run)]
    }
}
