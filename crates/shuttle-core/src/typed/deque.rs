//! Deque - 両端キュー
//!
//! push は alias が無ければ deque を作ります。pop / front / back は
//! 空なら `CONTAINER_EMPTY`、getAt / setAt は範囲外なら `OUT_OF_BOUNDS`。

use crate::app::binder::Shape;
use crate::app::dispatcher::Dispatcher;
use crate::app::marshal::{BufferResult, UnsignedResult, VoidResult};
use crate::domain::errors::BindError;
use crate::domain::ids::TaskId;
use crate::domain::task::Output;
use crate::domain::value::Value;

use super::entity::{Entity, EntityRef, status};
use super::entry::{Entry, entry_methods};
use super::registry::{EntityKind, Method};

#[derive(Debug, Clone)]
pub struct Deque {
    base: EntityRef,
}

impl Entity for Deque {
    fn base(&self) -> &EntityRef {
        &self.base
    }
}

impl Entry for Deque {}

impl Deque {
    pub fn push_front(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<VoidResult, _>(dispatcher, args, Shape::Buffer, |s, t| {
            status(s.deque_push_front(&t.alias, t.input.bytes()?))
        })
    }

    pub fn push_back(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<VoidResult, _>(dispatcher, args, Shape::Buffer, |s, t| {
            status(s.deque_push_back(&t.alias, t.input.bytes()?))
        })
    }

    pub fn pop_front(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<BufferResult, _>(dispatcher, args, Shape::None, |s, t| {
            s.deque_pop_front(&t.alias).map(Output::Buffer)
        })
    }

    pub fn pop_back(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<BufferResult, _>(dispatcher, args, Shape::None, |s, t| {
            s.deque_pop_back(&t.alias).map(Output::Buffer)
        })
    }

    pub fn front(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<BufferResult, _>(dispatcher, args, Shape::None, |s, t| {
            s.deque_front(&t.alias).map(Output::Buffer)
        })
    }

    pub fn back(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<BufferResult, _>(dispatcher, args, Shape::None, |s, t| {
            s.deque_back(&t.alias).map(Output::Buffer)
        })
    }

    pub fn size(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<UnsignedResult, _>(dispatcher, args, Shape::None, |s, t| {
            s.deque_size(&t.alias).map(Output::Unsigned)
        })
    }

    pub fn get_at(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<BufferResult, _>(dispatcher, args, Shape::Index, |s, t| {
            s.deque_get_at(&t.alias, t.input.integer()?).map(Output::Buffer)
        })
    }

    pub fn set_at(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<VoidResult, _>(dispatcher, args, Shape::IndexBuffer, |s, t| {
            let (index, content) = t.input.indexed()?;
            status(s.deque_set_at(&t.alias, index, content))
        })
    }
}

impl EntityKind for Deque {
    const KIND: &'static str = "deque";

    fn from_ref(base: EntityRef) -> Self {
        Self { base }
    }

    fn methods() -> Vec<Method<Self>> {
        let mut methods = vec![
            Method::new("pushFront", Self::push_front),
            Method::new("pushBack", Self::push_back),
            Method::new("popFront", Self::pop_front),
            Method::new("popBack", Self::pop_back),
            Method::new("front", Self::front),
            Method::new("back", Self::back),
            Method::new("size", Self::size),
            Method::new("getAt", Self::get_at),
            Method::new("setAt", Self::set_at),
        ];
        methods.extend(entry_methods::<Self>());
        methods
    }
}
