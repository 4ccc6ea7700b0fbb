//! Status - dispatch の件数

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

/// DispatchCounts は worker と caller の両方から更新されるカウンタ
#[derive(Debug, Default)]
pub struct DispatchCounts {
    queued: AtomicUsize,
    executing: AtomicUsize,
    completed: AtomicUsize,
    delivered: AtomicUsize,
    abnormal: AtomicUsize,
}

/// ある時点の件数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSnapshot {
    pub queued: usize,
    pub executing: usize,
    pub completed: usize,
    pub delivered: usize,
    pub abnormal: usize,
}

impl DispatchSnapshot {
    /// まだ callback が呼ばれていない件数
    pub fn in_flight(&self) -> usize {
        self.queued.saturating_sub(self.delivered)
    }
}

impl DispatchCounts {
    pub(crate) fn on_queued(&self) {
        self.queued.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn on_executing(&self) {
        self.executing.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn on_completed(&self, abnormal: bool) {
        self.executing.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        if abnormal {
            self.abnormal.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn on_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            queued: self.queued.load(Ordering::SeqCst),
            executing: self.executing.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            delivered: self.delivered.load(Ordering::SeqCst),
            abnormal: self.abnormal.load(Ordering::SeqCst),
        }
    }
}
