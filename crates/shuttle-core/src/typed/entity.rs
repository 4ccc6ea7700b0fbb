//! Entity trait - 全ての entity の基底
//!
//! entity は {alias, connection} の値で、同じ alias と connection を
//! 複数の entity が共有してかまいません。
//!
//! # 学習ポイント
//! - default method による機能の合成（`Entity` → `Entry` → `Expirable`）
//! - 呼び出し経路は monomorphize され、動的ディスパッチを通らない

use std::sync::Arc;

use crate::app::binder::{Shape, bind};
use crate::app::connection::ConnectionHandle;
use crate::app::descriptor::TaskDescriptor;
use crate::app::dispatcher::Dispatcher;
use crate::app::marshal::ResultMarshaler;
use crate::domain::errors::{BindError, ErrorCode};
use crate::domain::ids::TaskId;
use crate::domain::task::Output;
use crate::domain::time::Expiry;
use crate::domain::value::Value;
use crate::ports::NativeSession;

/// EntityRef は entity の識別情報
#[derive(Debug, Clone)]
pub struct EntityRef {
    pub alias: String,
    /// column の場合は所有する time-series の alias
    pub holder: Option<String>,
    pub connection: Arc<ConnectionHandle>,
}

impl EntityRef {
    pub fn new(alias: impl Into<String>, connection: Arc<ConnectionHandle>) -> Self {
        Self {
            alias: alias.into(),
            holder: None,
            connection,
        }
    }

    pub fn with_holder(mut self, holder: impl Into<String>) -> Self {
        self.holder = Some(holder.into());
        self
    }
}

pub trait Entity {
    fn base(&self) -> &EntityRef;

    fn alias(&self) -> &str {
        &self.base().alias
    }

    fn holder(&self) -> Option<&str> {
        self.base().holder.as_deref()
    }

    fn connection(&self) -> &Arc<ConnectionHandle> {
        &self.base().connection
    }

    /// 引数を束縛して native 操作を積む
    ///
    /// 束縛に失敗した場合は何も積まれず、callback も呼ばれません。
    fn queue<M, F>(
        &self,
        dispatcher: &Dispatcher,
        args: Vec<Value>,
        shape: Shape,
        op: F,
    ) -> Result<TaskId, BindError>
    where
        M: ResultMarshaler,
        F: FnOnce(&dyn NativeSession, &TaskDescriptor) -> Result<Output, ErrorCode> + Send + 'static,
    {
        let (bound, callback) = bind(args, shape)?;
        let base = self.base();
        let task = TaskDescriptor::new(dispatcher.next_task_id(), base.alias.clone(), Arc::clone(&base.connection))
            .with_holder(base.holder.clone())
            .with_input(bound.input)
            .with_expiry(bound.expiry);
        Ok(dispatcher.queue_work::<M, F>(task, op, callback))
    }
}

/// status だけを返す native 呼び出しの結果
pub(crate) fn status(code: ErrorCode) -> Result<Output, ErrorCode> {
    if code.is_success() {
        Ok(Output::None)
    } else {
        Err(code)
    }
}

/// 束縛時に決まった expiry。省略されていれば期限なし
pub(crate) fn expiry(task: &TaskDescriptor) -> Expiry {
    task.expiry.unwrap_or(Expiry::Never)
}
