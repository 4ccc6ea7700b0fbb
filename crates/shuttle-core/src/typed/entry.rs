//! Entry / Expirable - 永続 entry に共通の操作
//!
//! - `Entry`: remove、tag 操作、metadata、type
//! - `Expirable`: 有効期限の設定と取得
//!
//! 具象 kind は空の `impl Entry for X {}` で操作を獲得します。

use crate::app::binder::Shape;
use crate::app::dispatcher::Dispatcher;
use crate::app::marshal::{
    DateResult, EntryMetadataResult, EntryTypeResult, StringArrayResult, TagBatchResult, VoidResult,
};
use crate::domain::errors::{BindError, ErrorCode};
use crate::domain::ids::TaskId;
use crate::domain::task::Output;
use crate::domain::value::Value;

use super::entity::{Entity, status};
use super::registry::Method;

pub trait Entry: Entity {
    fn remove(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<VoidResult, _>(dispatcher, args, Shape::None, |s, t| status(s.remove(&t.alias)))
    }

    fn attach_tag(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<VoidResult, _>(dispatcher, args, Shape::String, |s, t| {
            status(s.attach_tag(&t.alias, t.input.string()?))
        })
    }

    fn attach_tags(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<VoidResult, _>(dispatcher, args, Shape::Strings, |s, t| {
            status(s.attach_tags(&t.alias, t.input.strings()?))
        })
    }

    fn detach_tag(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<VoidResult, _>(dispatcher, args, Shape::String, |s, t| {
            status(s.detach_tag(&t.alias, t.input.string()?))
        })
    }

    fn detach_tags(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<VoidResult, _>(dispatcher, args, Shape::Strings, |s, t| {
            status(s.detach_tags(&t.alias, t.input.strings()?))
        })
    }

    fn has_tag(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<VoidResult, _>(dispatcher, args, Shape::String, |s, t| {
            status(s.has_tag(&t.alias, t.input.string()?))
        })
    }

    /// タグごとに問い合わせる。個々の失敗は false として数え、全体は常に成功
    fn has_tags(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<TagBatchResult, _>(dispatcher, args, Shape::Strings, |s, t| {
            let results: Vec<(String, bool)> = t
                .input
                .strings()?
                .iter()
                .map(|tag| (tag.clone(), s.has_tag(&t.alias, tag) == ErrorCode::OK))
                .collect();
            let success_count = results.iter().filter(|(_, set)| *set).count();
            Ok(Output::TagBatch {
                success_count,
                results,
            })
        })
    }

    fn get_tags(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<StringArrayResult, _>(dispatcher, args, Shape::None, |s, t| {
            s.get_tags(&t.alias).map(Output::Strings)
        })
    }

    fn get_metadata(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<EntryMetadataResult, _>(dispatcher, args, Shape::None, |s, t| {
            s.get_metadata(&t.alias).map(Output::Metadata)
        })
    }

    fn get_type(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<EntryTypeResult, _>(dispatcher, args, Shape::None, |s, t| {
            s.get_type(&t.alias).map(Output::EntryType)
        })
    }
}

pub trait Expirable: Entry {
    fn expires_at(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<VoidResult, _>(dispatcher, args, Shape::Expiry, |s, t| {
            let expiry = t.expiry.ok_or(ErrorCode::INTERNAL_LOCAL)?;
            status(s.expires_at(&t.alias, expiry))
        })
    }

    /// `expiresFromNow(seconds, callback(error))`
    fn expires_from_now(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<VoidResult, _>(dispatcher, args, Shape::Seconds, |s, t| {
            status(s.expires_from_now(&t.alias, t.input.integer()?))
        })
    }

    fn get_expiry(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<DateResult, _>(dispatcher, args, Shape::None, |s, t| {
            s.get_expiry(&t.alias)
                .map(|expiry| Output::Date(expiry.map_or(0, |at| at.sec)))
        })
    }
}

pub fn entry_methods<E: Entry>() -> Vec<Method<E>> {
    vec![
        Method::new("remove", E::remove),
        Method::new("attachTag", E::attach_tag),
        Method::new("attachTags", E::attach_tags),
        Method::new("detachTag", E::detach_tag),
        Method::new("detachTags", E::detach_tags),
        Method::new("hasTag", E::has_tag),
        Method::new("hasTags", E::has_tags),
        Method::new("getTags", E::get_tags),
        Method::new("getMetadata", E::get_metadata),
        Method::new("getType", E::get_type),
    ]
}

/// entry の操作に有効期限の操作を加えたもの
pub fn expirable_methods<E: Expirable>() -> Vec<Method<E>> {
    let mut methods = entry_methods::<E>();
    methods.extend([
        Method::new("expiresAt", E::expires_at),
        Method::new("expiresFromNow", E::expires_from_now),
        Method::new("getExpiry", E::get_expiry),
    ]);
    methods
}
