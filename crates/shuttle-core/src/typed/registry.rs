//! KindRegistry - entity kind の登録と動的呼び出し
//!
//! # 二層構造
//! - **表層（Typed）**: `EntityKind` - kind ごとの具象型と、コンパイル時のメソッド表
//! - **内部（Dyn）**: `DynEntity` - object-safe、メソッド名で呼び出す
//!
//! `TypedEntity<E>` が `E` のメソッド表を持って `DynEntity` に変換します。
//! registry は起動時に一度だけ作り、参照で渡します（グローバル状態は持ちません）。

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::app::dispatcher::Dispatcher;
use crate::domain::errors::{BindError, ErrorCode};
use crate::domain::ids::TaskId;
use crate::domain::metadata::EntryType;
use crate::domain::series::{AggregationType, ColumnType};
use crate::domain::time::{NEVER_EXPIRES, PRESERVE_EXPIRATION};
use crate::domain::value::Value;

use super::entity::{Entity, EntityRef};

pub type MethodFn<E> = fn(&E, &Dispatcher, Vec<Value>) -> Result<TaskId, BindError>;

/// Method は名前付きの非同期メソッド
pub struct Method<E> {
    pub name: &'static str,
    pub call: MethodFn<E>,
}

impl<E> Method<E> {
    pub fn new(name: &'static str, call: MethodFn<E>) -> Self {
        Self { name, call }
    }
}

/// EntityKind は kind 名と具象型を対応付ける
pub trait EntityKind: Entity + Sized + 'static {
    const KIND: &'static str;

    fn from_ref(base: EntityRef) -> Self;

    fn methods() -> Vec<Method<Self>>;
}

/// DynEntity は object-safe な entity の抽象化
pub trait DynEntity {
    fn kind(&self) -> &'static str;

    fn alias(&self) -> &str;

    fn method_names(&self) -> Vec<&'static str>;

    /// 名前でメソッドを呼ぶ。未知の名前は同期エラー
    fn invoke(&self, dispatcher: &Dispatcher, method: &str, args: Vec<Value>) -> Result<TaskId, BindError>;
}

pub struct TypedEntity<E: EntityKind> {
    entity: E,
    methods: Arc<[Method<E>]>,
}

impl<E: EntityKind> TypedEntity<E> {
    pub fn new(entity: E) -> Self {
        Self {
            entity,
            methods: E::methods().into(),
        }
    }

    pub fn entity(&self) -> &E {
        &self.entity
    }
}

impl<E: EntityKind> DynEntity for TypedEntity<E> {
    fn kind(&self) -> &'static str {
        E::KIND
    }

    fn alias(&self) -> &str {
        self.entity.alias()
    }

    fn method_names(&self) -> Vec<&'static str> {
        self.methods.iter().map(|m| m.name).collect()
    }

    fn invoke(&self, dispatcher: &Dispatcher, method: &str, args: Vec<Value>) -> Result<TaskId, BindError> {
        let found = self
            .methods
            .iter()
            .find(|m| m.name == method)
            .ok_or_else(|| BindError::UnknownMethod {
                kind: E::KIND.to_string(),
                method: method.to_string(),
            })?;
        (found.call)(&self.entity, dispatcher, args)
    }
}

/// kind ごとのメソッド表を保持して entity を作る
trait KindFactory {
    fn create(&self, base: EntityRef) -> Box<dyn DynEntity>;
}

struct TypedFactory<E: EntityKind> {
    methods: Arc<[Method<E>]>,
    _marker: PhantomData<E>,
}

impl<E: EntityKind> KindFactory for TypedFactory<E> {
    fn create(&self, base: EntityRef) -> Box<dyn DynEntity> {
        Box::new(TypedEntity {
            entity: E::from_ref(base),
            methods: Arc::clone(&self.methods),
        })
    }
}

/// RegistryError は KindRegistry の操作エラー
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Entity kind '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("Entity kind '{0}' is not registered")]
    UnknownKind(String),
}

#[derive(Default)]
pub struct KindRegistry {
    kinds: HashMap<&'static str, Box<dyn KindFactory>>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<E: EntityKind>(&mut self) -> Result<(), RegistryError> {
        if self.kinds.contains_key(E::KIND) {
            return Err(RegistryError::AlreadyRegistered(E::KIND.to_string()));
        }
        let factory = TypedFactory::<E> {
            methods: E::methods().into(),
            _marker: PhantomData,
        };
        self.kinds.insert(E::KIND, Box::new(factory));
        Ok(())
    }

    pub fn create(&self, kind: &str, base: EntityRef) -> Result<Box<dyn DynEntity>, RegistryError> {
        let factory = self
            .kinds
            .get(kind)
            .ok_or_else(|| RegistryError::UnknownKind(kind.to_string()))?;
        Ok(factory.create(base))
    }

    pub fn registered_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.kinds.keys().map(|k| k.to_string()).collect();
        kinds.sort();
        kinds
    }

    /// caller 側に公開する定数表（error code、column / aggregation / entry の型、特殊 expiry）
    pub fn constants(&self) -> Vec<(String, i64)> {
        let mut table: Vec<(String, i64)> = ErrorCode::known()
            .map(|(code, name)| (format!("E_{name}"), i64::from(code.raw())))
            .collect();
        table.extend(ColumnType::ALL.iter().map(|t| (t.name().to_string(), t.as_number())));
        table.extend(AggregationType::ALL.iter().map(|t| (t.name().to_string(), t.as_number())));
        table.extend(EntryType::ALL.iter().map(|t| (t.name().to_string(), t.as_number())));
        table.push(("NEVER_EXPIRES".to_string(), NEVER_EXPIRES));
        table.push(("PRESERVE_EXPIRATION".to_string(), PRESERVE_EXPIRATION));
        table
    }
}

impl std::fmt::Debug for KindRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindRegistry")
            .field("kinds", &self.registered_kinds())
            .finish()
    }
}
