//! HSet - バイト列の集合

use crate::app::binder::Shape;
use crate::app::dispatcher::Dispatcher;
use crate::app::marshal::VoidResult;
use crate::domain::errors::BindError;
use crate::domain::ids::TaskId;
use crate::domain::value::Value;

use super::entity::{Entity, EntityRef, status};
use super::entry::{Entry, entry_methods};
use super::registry::{EntityKind, Method};

#[derive(Debug, Clone)]
pub struct HSet {
    base: EntityRef,
}

impl Entity for HSet {
    fn base(&self) -> &EntityRef {
        &self.base
    }
}

impl Entry for HSet {}

impl HSet {
    /// 既にあれば `ELEMENT_ALREADY_EXISTS`
    pub fn insert(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<VoidResult, _>(dispatcher, args, Shape::Buffer, |s, t| {
            status(s.hset_insert(&t.alias, t.input.bytes()?))
        })
    }

    pub fn erase(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<VoidResult, _>(dispatcher, args, Shape::Buffer, |s, t| {
            status(s.hset_erase(&t.alias, t.input.bytes()?))
        })
    }

    /// 含まれていなければ `ELEMENT_NOT_FOUND`
    pub fn contains(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<VoidResult, _>(dispatcher, args, Shape::Buffer, |s, t| {
            status(s.hset_contains(&t.alias, t.input.bytes()?))
        })
    }
}

impl EntityKind for HSet {
    const KIND: &'static str = "hset";

    fn from_ref(base: EntityRef) -> Self {
        Self { base }
    }

    fn methods() -> Vec<Method<Self>> {
        let mut methods = vec![
            Method::new("insert", Self::insert),
            Method::new("erase", Self::erase),
            Method::new("contains", Self::contains),
        ];
        methods.extend(entry_methods::<Self>());
        methods
    }
}
