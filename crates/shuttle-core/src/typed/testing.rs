//! テスト用の接続済み環境

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use tokio::runtime::Handle;

use crate::app::connection::ConnectionHandle;
use crate::app::dispatcher::Dispatcher;
use crate::config::ClientConfig;
use crate::domain::errors::{BindError, ErrorCode, QdbError};
use crate::domain::ids::TaskId;
use crate::domain::value::Value;
use crate::impls::InMemoryCluster;
use crate::ports::{Clock, SystemClock, UlidGenerator};

use super::entity::EntityRef;

pub(crate) const URI: &str = "qdb://127.0.0.1:2836";

pub(crate) struct Harness {
    pub cluster: InMemoryCluster,
    pub dispatcher: Dispatcher,
    pub connection: Arc<ConnectionHandle>,
}

impl Harness {
    /// tokio runtime の中で呼ぶこと
    pub fn connected() -> Self {
        let harness = Self::disconnected();
        harness.connection.connect(&harness.cluster).unwrap();
        harness
    }

    /// 記憶域の時刻を `clock` で進める接続済み環境
    pub fn connected_with_clock(clock: Arc<dyn Clock>) -> Self {
        let harness = Self {
            cluster: InMemoryCluster::with_clock(URI, clock),
            ..Self::disconnected()
        };
        harness.connection.connect(&harness.cluster).unwrap();
        harness
    }

    pub fn disconnected() -> Self {
        Self {
            cluster: InMemoryCluster::new(URI),
            dispatcher: Dispatcher::new(Arc::new(UlidGenerator::new(SystemClock)), Handle::current()),
            connection: Arc::new(ConnectionHandle::new(ClientConfig::new(URI))),
        }
    }

    pub fn entity_ref(&self, alias: &str) -> EntityRef {
        EntityRef::new(alias, Arc::clone(&self.connection))
    }

    /// callback を末尾に足して呼び、配送された argv を返す
    pub async fn call(
        &self,
        mut args: Vec<Value>,
        f: impl FnOnce(&Dispatcher, Vec<Value>) -> Result<TaskId, BindError>,
    ) -> Vec<Value> {
        let seen: Rc<RefCell<Option<Vec<Value>>>> = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        args.push(Value::function(move |argv| {
            *sink.borrow_mut() = Some(argv);
        }));
        f(&self.dispatcher, args).unwrap();
        self.dispatcher.run_until_idle().await;
        seen.borrow_mut().take().unwrap()
    }
}

pub(crate) fn error_of(argv: &[Value]) -> Option<ErrorCode> {
    argv[0].as_error().map(QdbError::error_code)
}
