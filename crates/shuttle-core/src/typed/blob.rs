//! Blob - バイト列の entry

use crate::app::binder::Shape;
use crate::app::dispatcher::Dispatcher;
use crate::app::marshal::{BufferResult, VoidResult};
use crate::domain::errors::BindError;
use crate::domain::ids::TaskId;
use crate::domain::task::Output;
use crate::domain::value::Value;

use super::entity::{Entity, EntityRef, expiry, status};
use super::entry::{Entry, Expirable, expirable_methods};
use super::registry::{EntityKind, Method};

#[derive(Debug, Clone)]
pub struct Blob {
    base: EntityRef,
}

impl Entity for Blob {
    fn base(&self) -> &EntityRef {
        &self.base
    }
}

impl Entry for Blob {}

impl Expirable for Blob {}

impl Blob {
    /// `put(content, [expiry], callback(error))`。既存なら `ALIAS_ALREADY_EXISTS`
    pub fn put(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<VoidResult, _>(dispatcher, args, Shape::BufferExpiry, |s, t| {
            status(s.blob_put(&t.alias, t.input.bytes()?, expiry(t)))
        })
    }

    /// `update(content, [expiry], callback(error))`。なければ `ALIAS_NOT_FOUND`
    pub fn update(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<VoidResult, _>(dispatcher, args, Shape::BufferExpiry, |s, t| {
            status(s.blob_update(&t.alias, t.input.bytes()?, expiry(t)))
        })
    }

    /// `get(callback(error, buffer))`
    pub fn get(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<BufferResult, _>(dispatcher, args, Shape::None, |s, t| {
            s.blob_get(&t.alias).map(Output::Buffer)
        })
    }

    pub fn get_and_remove(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<BufferResult, _>(dispatcher, args, Shape::None, |s, t| {
            s.blob_get_and_remove(&t.alias).map(Output::Buffer)
        })
    }
}

impl EntityKind for Blob {
    const KIND: &'static str = "blob";

    fn from_ref(base: EntityRef) -> Self {
        Self { base }
    }

    fn methods() -> Vec<Method<Self>> {
        let mut methods = vec![
            Method::new("put", Self::put),
            Method::new("update", Self::update),
            Method::new("get", Self::get),
            Method::new("getAndRemove", Self::get_and_remove),
        ];
        methods.extend(expirable_methods::<Self>());
        methods
    }
}
