//! TaskDescriptor - 1 回の呼び出しを worker に運ぶ自己完結した記述
//!
//! # ライフサイクル
//! - caller スレッドで入力を全部詰めてから enqueue する
//! - worker スレッドが body を実行し、output と error を一度だけ書く
//! - caller スレッドへ戻り、marshaler が消費する
//!
//! 同時に複数スレッドから触られることはありません（move のみ）。

use std::sync::Arc;

use crate::domain::errors::ErrorCode;
use crate::domain::ids::TaskId;
use crate::domain::task::{Input, Output};
use crate::domain::time::Expiry;

use super::connection::ConnectionHandle;

#[derive(Debug)]
pub struct TaskDescriptor {
    pub id: TaskId,
    pub alias: String,
    /// column の場合は所有する time-series の alias
    pub holder: Option<String>,
    pub input: Input,
    pub expiry: Option<Expiry>,
    pub connection: Arc<ConnectionHandle>,
    output: Output,
    error: ErrorCode,
}

impl TaskDescriptor {
    pub fn new(id: TaskId, alias: impl Into<String>, connection: Arc<ConnectionHandle>) -> Self {
        Self {
            id,
            alias: alias.into(),
            holder: None,
            input: Input::None,
            expiry: None,
            connection,
            output: Output::None,
            error: ErrorCode::UNINITIALIZED,
        }
    }

    pub fn with_input(mut self, input: Input) -> Self {
        self.input = input;
        self
    }

    pub fn with_expiry(mut self, expiry: Option<Expiry>) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn with_holder(mut self, holder: Option<String>) -> Self {
        self.holder = holder;
        self
    }

    pub fn error(&self) -> ErrorCode {
        self.error
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    /// まだ body が結果を書いていないか
    pub fn is_pending(&self) -> bool {
        !self.error.is_terminal()
    }

    /// status だけを確定させる。二度目以降は無視される
    pub fn resolve_status(&mut self, code: ErrorCode) {
        if self.is_pending() {
            self.error = code;
        }
    }

    /// body の結果を確定させる。二度目以降は無視される
    pub fn resolve(&mut self, result: Result<Output, ErrorCode>) {
        if !self.is_pending() {
            return;
        }
        match result {
            Ok(output) => {
                self.output = output;
                self.error = ErrorCode::OK;
            }
            Err(code) => self.error = code,
        }
    }

    /// marshaler が output を取り出す
    pub fn take_output(&mut self) -> Output {
        std::mem::take(&mut self.output)
    }
}
