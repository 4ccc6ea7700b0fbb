//! Dispatcher - ブロッキング呼び出しを worker pool に流し、結果を caller に戻す
//!
//! # フロー
//! 1. caller スレッドで `TaskDescriptor` と callback を受け取る
//! 2. callback は caller 側の pending 表に残し、descriptor だけを worker へ move
//! 3. worker が body を実行（panic は捕まえて異常終了扱い）
//! 4. completion channel で descriptor が caller 側へ戻る
//! 5. `deliver_next` / `run_until_idle` で marshaler → callback の順に実行
//!
//! callback は必ず caller スレッドで、タスクごとにちょうど一度だけ呼ばれます。
//! `Dispatcher` 自体は callback を抱えるので `Send` ではありません。

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{Mutex, mpsc};

use crate::domain::errors::ErrorCode;
use crate::domain::ids::TaskId;
use crate::domain::state::{TaskState, WorkerStatus};
use crate::domain::task::Output;
use crate::domain::value::{Callback, Value};
use crate::ports::{IdGenerator, NativeSession};

use super::descriptor::TaskDescriptor;
use super::marshal::ResultMarshaler;
use super::status::DispatchCounts;

type MarshalFn = fn(&WorkerStatus, &mut TaskDescriptor) -> Vec<Value>;

struct PendingCall {
    alias: String,
    marshal: MarshalFn,
    arity: usize,
    callback: Callback,
}

struct Completion {
    task: TaskDescriptor,
    status: WorkerStatus,
}

pub struct Dispatcher {
    ids: Arc<dyn IdGenerator>,
    counts: Arc<DispatchCounts>,
    pending: RefCell<HashMap<TaskId, PendingCall>>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: Mutex<mpsc::UnboundedReceiver<Completion>>,
    runtime: Handle,
}

impl Dispatcher {
    pub fn new(ids: Arc<dyn IdGenerator>, runtime: Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            ids,
            counts: Arc::new(DispatchCounts::default()),
            pending: RefCell::new(HashMap::new()),
            tx,
            rx: Mutex::new(rx),
            runtime,
        }
    }

    pub fn next_task_id(&self) -> TaskId {
        self.ids.generate_task_id()
    }

    pub fn counts(&self) -> &DispatchCounts {
        &self.counts
    }

    /// callback 待ちのタスク数
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// 接続中の native handle に対する操作を積む
    ///
    /// handle は worker 側で snapshot を取ってから使います。未接続なら `NOT_CONNECTED`。
    pub fn queue_work<M, F>(&self, task: TaskDescriptor, op: F, callback: Callback) -> TaskId
    where
        M: ResultMarshaler,
        F: FnOnce(&dyn NativeSession, &TaskDescriptor) -> Result<Output, ErrorCode> + Send + 'static,
    {
        self.queue_raw::<M, _>(
            task,
            move |task| {
                let result = match task.connection.snapshot() {
                    Some(session) => op(&*session, task),
                    None => Err(ErrorCode::NOT_CONNECTED),
                };
                task.resolve(result);
            },
            callback,
        )
    }

    /// 任意の body を積む。body は descriptor の error slot を確定させる責任を持つ
    pub fn queue_raw<M, F>(&self, task: TaskDescriptor, body: F, callback: Callback) -> TaskId
    where
        M: ResultMarshaler,
        F: FnOnce(&mut TaskDescriptor) + Send + 'static,
    {
        let id = task.id;
        self.pending.borrow_mut().insert(
            id,
            PendingCall {
                alias: task.alias.clone(),
                marshal: M::marshal,
                arity: M::ARITY,
                callback,
            },
        );
        self.counts.on_queued();
        transition(id, TaskState::Building, TaskState::Queued);
        tracing::debug!(task = %id, alias = %task.alias, "task queued");

        let guard = WorkerGuard {
            tx: self.tx.clone(),
            counts: Arc::clone(&self.counts),
            task: Some(task),
            started: false,
        };
        // JoinHandle は使わない。結果は completion channel で戻る
        drop(self.runtime.spawn_blocking(move || guard.run(body)));
        id
    }

    /// 次の completion を待って配送する。待つべきタスクがなければ `false`
    pub async fn deliver_next(&self) -> bool {
        if self.pending.borrow().is_empty() {
            return false;
        }
        let completion = {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        };
        match completion {
            Some(completion) => {
                self.deliver(completion);
                true
            }
            None => false,
        }
    }

    /// 既に届いている completion だけを配送する
    pub fn try_deliver(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = match self.rx.try_lock() {
                Ok(mut rx) => rx.try_recv().ok(),
                Err(_) => None,
            };
            let Some(completion) = next else {
                break;
            };
            self.deliver(completion);
            delivered += 1;
        }
        delivered
    }

    /// pending が空になるまで配送する。callback が積んだタスクも含む
    pub async fn run_until_idle(&self) -> usize {
        let mut delivered = 0;
        while self.deliver_next().await {
            delivered += 1;
        }
        delivered
    }

    fn deliver(&self, completion: Completion) {
        let Completion { mut task, status } = completion;
        let id = task.id;
        // borrow は callback の前に手放す（callback が次のタスクを積むことがある）
        let call = self.pending.borrow_mut().remove(&id);
        let Some(call) = call else {
            tracing::warn!(task = %id, "completion for unknown task dropped");
            return;
        };

        if let WorkerStatus::Abnormal(reason) = &status {
            tracing::warn!(task = %id, alias = %call.alias, reason = %reason, "task terminated abnormally");
        }

        let argv = (call.marshal)(&status, &mut task);
        debug_assert_eq!(argv.len(), call.arity);
        tracing::debug!(task = %id, alias = %call.alias, error = %task.error(), "delivering result");
        transition(id, TaskState::Completed, TaskState::Delivered);

        call.callback.call(argv);

        drop(task);
        transition(id, TaskState::Delivered, TaskState::Disposed);
        self.counts.on_delivered();
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending", &self.pending_count())
            .field("counts", &self.counts.snapshot())
            .finish()
    }
}

fn transition(id: TaskId, from: TaskState, to: TaskState) {
    debug_assert!(from.can_advance_to(to));
    tracing::trace!(task = %id, from = ?from, to = ?to, "task state");
}

/// worker 側で descriptor を持つ。body を実行しないまま drop されても
/// 異常終了として caller 側に戻す
struct WorkerGuard {
    tx: mpsc::UnboundedSender<Completion>,
    counts: Arc<DispatchCounts>,
    task: Option<TaskDescriptor>,
    started: bool,
}

impl WorkerGuard {
    fn run(mut self, body: impl FnOnce(&mut TaskDescriptor)) {
        let Some(mut task) = self.task.take() else {
            return;
        };
        self.started = true;
        self.counts.on_executing();
        transition(task.id, TaskState::Queued, TaskState::Executing);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            if task.is_pending() {
                body(&mut task);
            }
        }));
        let status = match outcome {
            Ok(()) => WorkerStatus::Finished,
            Err(payload) => WorkerStatus::Abnormal(panic_message(payload.as_ref())),
        };
        self.complete(task, status);
    }

    fn complete(&self, task: TaskDescriptor, status: WorkerStatus) {
        self.counts.on_completed(status.is_abnormal());
        transition(task.id, TaskState::Executing, TaskState::Completed);
        // caller 側が先に消えていれば結果は捨てる
        let _ = self.tx.send(Completion { task, status });
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            if !self.started {
                self.counts.on_executing();
            }
            self.complete(task, WorkerStatus::Abnormal("worker dropped the task".to_string()));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::app::connection::ConnectionHandle;
    use crate::app::marshal::{IntegerResult, VoidResult};
    use crate::config::ClientConfig;
    use crate::domain::errors::QdbError;
    use crate::impls::InMemoryCluster;
    use crate::ports::{SystemClock, UlidGenerator};

    const URI: &str = "qdb://127.0.0.1:2836";

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(UlidGenerator::new(SystemClock)), Handle::current())
    }

    fn task(d: &Dispatcher, conn: &Arc<ConnectionHandle>) -> TaskDescriptor {
        TaskDescriptor::new(d.next_task_id(), "alias", Arc::clone(conn))
    }

    fn capture() -> (Callback, Rc<RefCell<Vec<Vec<Value>>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&calls);
        (Callback::new(move |argv| seen.borrow_mut().push(argv)), calls)
    }

    fn error_of(argv: &[Value]) -> Option<ErrorCode> {
        argv[0].as_error().map(QdbError::error_code)
    }

    #[tokio::test]
    async fn callback_runs_exactly_once() {
        let d = dispatcher();
        let conn = Arc::new(ConnectionHandle::new(ClientConfig::new(URI)));
        let (cb, calls) = capture();

        d.queue_raw::<IntegerResult, _>(task(&d, &conn), |t| t.resolve(Ok(Output::Integer(7))), cb);
        assert_eq!(d.pending_count(), 1);

        assert_eq!(d.run_until_idle().await, 1);
        assert_eq!(d.run_until_idle().await, 0);
        assert_eq!(d.try_deliver(), 0);

        let calls = calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec![Value::Null, Value::Number(7.0)]);

        let counts = d.counts().snapshot();
        assert_eq!(counts.queued, 1);
        assert_eq!(counts.delivered, 1);
        assert_eq!(counts.executing, 0);
        assert_eq!(counts.in_flight(), 0);
    }

    #[tokio::test]
    async fn panicking_body_is_reported_as_internal_error() {
        let d = dispatcher();
        let conn = Arc::new(ConnectionHandle::new(ClientConfig::new(URI)));
        let (cb, calls) = capture();

        d.queue_raw::<VoidResult, _>(task(&d, &conn), |_| panic!("boom"), cb);
        d.run_until_idle().await;

        assert_eq!(error_of(&calls.borrow()[0]), Some(ErrorCode::INTERNAL_LOCAL));
        assert_eq!(d.counts().snapshot().abnormal, 1);
    }

    #[tokio::test]
    async fn body_that_never_resolves_is_internal_error() {
        let d = dispatcher();
        let conn = Arc::new(ConnectionHandle::new(ClientConfig::new(URI)));
        let (cb, calls) = capture();

        d.queue_raw::<VoidResult, _>(task(&d, &conn), |_| {}, cb);
        d.run_until_idle().await;

        assert_eq!(error_of(&calls.borrow()[0]), Some(ErrorCode::INTERNAL_LOCAL));
        assert_eq!(d.counts().snapshot().abnormal, 0);
    }

    #[tokio::test]
    async fn work_without_connection_is_not_connected() {
        let d = dispatcher();
        let conn = Arc::new(ConnectionHandle::new(ClientConfig::new(URI)));
        let (cb, calls) = capture();

        d.queue_work::<IntegerResult, _>(task(&d, &conn), |s, t| s.int_get(&t.alias).map(Output::Integer), cb);
        d.run_until_idle().await;

        let calls = calls.borrow();
        assert_eq!(error_of(&calls[0]), Some(ErrorCode::NOT_CONNECTED));
        assert_eq!(calls[0][1], Value::Number(0.0));
    }

    #[tokio::test]
    async fn work_runs_against_current_session() {
        let cluster = InMemoryCluster::new(URI);
        let d = dispatcher();
        let conn = Arc::new(ConnectionHandle::new(ClientConfig::new(URI)));
        conn.connect(&cluster).unwrap();
        let (cb, calls) = capture();

        d.queue_work::<IntegerResult, _>(
            task(&d, &conn),
            |s, t| {
                let status = s.int_put(&t.alias, 40, crate::domain::Expiry::Never);
                if !status.is_success() {
                    return Err(status);
                }
                s.int_add(&t.alias, 2).map(Output::Integer)
            },
            cb,
        );
        d.run_until_idle().await;

        assert_eq!(calls.borrow()[0], vec![Value::Null, Value::Number(42.0)]);
    }

    #[tokio::test]
    async fn callbacks_may_queue_more_work() {
        let d = Rc::new(dispatcher());
        let conn = Arc::new(ConnectionHandle::new(ClientConfig::new(URI)));
        let hits = Rc::new(Cell::new(0));

        let inner_d = Rc::clone(&d);
        let inner_conn = Arc::clone(&conn);
        let inner_hits = Rc::clone(&hits);
        let first = Callback::new(move |_| {
            inner_hits.set(inner_hits.get() + 1);
            let hits = Rc::clone(&inner_hits);
            inner_d.queue_raw::<VoidResult, _>(
                task(&inner_d, &inner_conn),
                |t| t.resolve_status(ErrorCode::OK),
                Callback::new(move |_| hits.set(hits.get() + 1)),
            );
        });

        d.queue_raw::<VoidResult, _>(task(&d, &conn), |t| t.resolve_status(ErrorCode::OK), first);
        assert_eq!(d.run_until_idle().await, 2);
        assert_eq!(hits.get(), 2);
    }
}
