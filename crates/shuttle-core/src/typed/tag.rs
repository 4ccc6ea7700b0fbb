//! Tag - タグ付けされた entry の一覧

use crate::app::binder::Shape;
use crate::app::dispatcher::Dispatcher;
use crate::app::marshal::StringArrayResult;
use crate::domain::errors::BindError;
use crate::domain::ids::TaskId;
use crate::domain::task::Output;
use crate::domain::value::Value;

use super::entity::{Entity, EntityRef};
use super::entry::{Entry, entry_methods};
use super::registry::{EntityKind, Method};

#[derive(Debug, Clone)]
pub struct Tag {
    base: EntityRef,
}

impl Entity for Tag {
    fn base(&self) -> &EntityRef {
        &self.base
    }
}

impl Entry for Tag {}

impl Tag {
    pub fn get_entries(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<StringArrayResult, _>(dispatcher, args, Shape::None, |s, t| {
            s.tag_entries(&t.alias).map(Output::Strings)
        })
    }
}

impl EntityKind for Tag {
    const KIND: &'static str = "tag";

    fn from_ref(base: EntityRef) -> Self {
        Self { base }
    }

    fn methods() -> Vec<Method<Self>> {
        let mut methods = vec![Method::new("getEntries", Self::get_entries)];
        methods.extend(entry_methods::<Self>());
        methods
    }
}
