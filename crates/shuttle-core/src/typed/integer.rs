//! Integer - 符号付き 64bit 整数の entry

use crate::app::binder::Shape;
use crate::app::dispatcher::Dispatcher;
use crate::app::marshal::{IntegerResult, VoidResult};
use crate::domain::errors::BindError;
use crate::domain::ids::TaskId;
use crate::domain::task::Output;
use crate::domain::value::Value;

use super::entity::{Entity, EntityRef, expiry, status};
use super::entry::{Entry, Expirable, expirable_methods};
use super::registry::{EntityKind, Method};

#[derive(Debug, Clone)]
pub struct Integer {
    base: EntityRef,
}

impl Entity for Integer {
    fn base(&self) -> &EntityRef {
        &self.base
    }
}

impl Entry for Integer {}

impl Expirable for Integer {}

impl Integer {
    pub fn put(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<VoidResult, _>(dispatcher, args, Shape::IntegerExpiry, |s, t| {
            status(s.int_put(&t.alias, t.input.integer()?, expiry(t)))
        })
    }

    pub fn update(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<VoidResult, _>(dispatcher, args, Shape::IntegerExpiry, |s, t| {
            status(s.int_update(&t.alias, t.input.integer()?, expiry(t)))
        })
    }

    pub fn get(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<IntegerResult, _>(dispatcher, args, Shape::None, |s, t| {
            s.int_get(&t.alias).map(Output::Integer)
        })
    }

    /// `add(addend, callback(error, result))`。加算後の値を返す
    pub fn add(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<IntegerResult, _>(dispatcher, args, Shape::Integer, |s, t| {
            s.int_add(&t.alias, t.input.integer()?).map(Output::Integer)
        })
    }
}

impl EntityKind for Integer {
    const KIND: &'static str = "integer";

    fn from_ref(base: EntityRef) -> Self {
        Self { base }
    }

    fn methods() -> Vec<Method<Self>> {
        let mut methods = vec![
            Method::new("put", Self::put),
            Method::new("update", Self::update),
            Method::new("get", Self::get),
            Method::new("add", Self::add),
        ];
        methods.extend(expirable_methods::<Self>());
        methods
    }
}
