//! State - dispatch されるタスクの状態
//!
//! # 状態遷移
//! - building: 引数束縛中（失敗してもここから先へは進まない）
//! - queued: worker pool に投入済み
//! - executing: worker が body を実行中
//! - completed: error slot が確定（成功・失敗・異常終了）
//! - delivered: caller 側で marshaler が callback を呼んだ
//! - disposed: descriptor を解放した

use serde::{Deserialize, Serialize};

/// TaskState はタスクの状態を表現
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Building,
    Queued,
    Executing,
    Completed,
    Delivered,
    Disposed,
}

impl TaskState {
    /// これ以上遷移しない状態か
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Disposed)
    }

    /// 許可された遷移かどうか
    ///
    /// 遷移は一方向のみ。戻りもスキップもありません。
    pub fn can_advance_to(self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Building, TaskState::Queued)
                | (TaskState::Queued, TaskState::Executing)
                | (TaskState::Executing, TaskState::Completed)
                | (TaskState::Completed, TaskState::Delivered)
                | (TaskState::Delivered, TaskState::Disposed)
        )
    }
}

/// WorkerStatus は worker 側の実行結果
///
/// `Abnormal` は body が panic した、または worker から結果が返らなかった場合。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    Finished,
    Abnormal(String),
}

impl WorkerStatus {
    pub fn is_abnormal(&self) -> bool {
        matches!(self, WorkerStatus::Abnormal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TaskState::Building, TaskState::Queued, true)]
    #[case(TaskState::Queued, TaskState::Executing, true)]
    #[case(TaskState::Executing, TaskState::Completed, true)]
    #[case(TaskState::Completed, TaskState::Delivered, true)]
    #[case(TaskState::Delivered, TaskState::Disposed, true)]
    #[case(TaskState::Building, TaskState::Executing, false)]
    #[case(TaskState::Completed, TaskState::Executing, false)]
    #[case(TaskState::Disposed, TaskState::Building, false)]
    fn transitions_only_move_forward(
        #[case] from: TaskState,
        #[case] to: TaskState,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_advance_to(to), allowed);
    }

    #[test]
    fn only_disposed_is_terminal() {
        assert!(TaskState::Disposed.is_terminal());
        assert!(!TaskState::Delivered.is_terminal());
    }
}
