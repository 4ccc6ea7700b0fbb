//! ClientBuilder - client の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::config::{ClientConfig, ConfigError};
use crate::ports::{IdGenerator, NativeConnector, SystemClock, UlidGenerator};
use crate::typed::{
    Blob, BlobKind, Column, Deque, DoubleKind, EntityKind, HSet, Int64Kind, Integer, KindRegistry, Prefix, Query,
    QueryFind, Range, RegistryError, StringKind, Suffix, SymbolKind, Tag, TimeSeries, TimestampKind,
};

use super::cluster::Cluster;
use super::connection::ConnectionHandle;
use super::dispatcher::Dispatcher;

/// ClientBuilder は client を構築
///
/// # 使用例
/// ```ignore
/// let client = ClientBuilder::new(Arc::new(connector))
///     .with_standard_kinds()?
///     .expect_kinds(&["blob", "ts"])
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - expect_kinds() で期待される kind を登録
/// - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
/// - 不足があれば BuildError を返す
pub struct ClientBuilder {
    registry: KindRegistry,
    expected_kinds: Option<Vec<String>>,
    config: ClientConfig,
    connector: Arc<dyn NativeConnector>,
    ids: Option<Arc<dyn IdGenerator>>,
    runtime: Option<Handle>,
}

/// BuildError は client 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing entity kinds: {0:?}. These kinds were expected but not registered.")]
    MissingKinds(Vec<String>),

    #[error("No tokio runtime: build() must run inside a runtime or be given a handle")]
    NoRuntime,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientBuilder {
    pub fn new(connector: Arc<dyn NativeConnector>) -> Self {
        Self {
            registry: KindRegistry::new(),
            expected_kinds: None,
            config: ClientConfig::default(),
            connector,
            ids: None,
            runtime: None,
        }
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// worker を走らせる runtime。省略時は build() を呼んだ runtime
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn register<E: EntityKind>(mut self) -> Result<Self, RegistryError> {
        self.registry.register::<E>()?;
        Ok(self)
    }

    /// 組み込みの kind を全部登録する
    pub fn with_standard_kinds(self) -> Result<Self, RegistryError> {
        self.register::<Blob>()?
            .register::<Integer>()?
            .register::<Deque>()?
            .register::<HSet>()?
            .register::<Tag>()?
            .register::<Prefix>()?
            .register::<Suffix>()?
            .register::<TimeSeries>()?
            .register::<Query>()?
            .register::<QueryFind>()?
            .register::<Range>()?
            .register::<Column<DoubleKind>>()?
            .register::<Column<BlobKind>>()?
            .register::<Column<Int64Kind>>()?
            .register::<Column<TimestampKind>>()?
            .register::<Column<StringKind>>()?
            .register::<Column<SymbolKind>>()
    }

    pub fn expect_kinds(mut self, kinds: &[&str]) -> Self {
        self.expected_kinds = Some(kinds.iter().map(|k| k.to_string()).collect());
        self
    }

    /// # 検証
    /// - 設定値（timeout の下限、鍵ファイルの組）
    /// - expect_kinds() で設定された kind が全て登録されているか
    pub fn build(self) -> Result<Client, BuildError> {
        self.config.validate()?;

        if let Some(expected_kinds) = &self.expected_kinds {
            let registered = self.registry.registered_kinds();
            let missing: Vec<String> = expected_kinds
                .iter()
                .filter(|k| !registered.contains(k))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingKinds(missing));
            }
        }

        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| BuildError::NoRuntime)?,
        };
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock)));

        tracing::debug!(
            uri = %self.config.uri,
            kinds = ?self.registry.registered_kinds(),
            "client built"
        );
        let connection = Arc::new(ConnectionHandle::new(self.config));
        Ok(Client {
            registry: self.registry,
            dispatcher: Dispatcher::new(ids, runtime),
            cluster: Cluster::new(connection, self.connector),
        })
    }
}

/// Client は 1 つの caller スレッドで使う client 一式
#[derive(Debug)]
pub struct Client {
    pub registry: KindRegistry,
    pub dispatcher: Dispatcher,
    pub cluster: Cluster,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryCluster;

    fn connector() -> Arc<dyn NativeConnector> {
        Arc::new(InMemoryCluster::new(crate::config::DEFAULT_URI))
    }

    #[tokio::test]
    async fn test_build_success() {
        let client = ClientBuilder::new(connector())
            .with_standard_kinds()
            .unwrap()
            .expect_kinds(&["blob", "range", "ts", "column_double"])
            .build();
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_build_missing_kinds() {
        let client = ClientBuilder::new(connector())
            .register::<Blob>()
            .unwrap()
            .expect_kinds(&["blob", "deque"])
            .build();
        assert!(matches!(
            client,
            Err(BuildError::MissingKinds(missing)) if missing == vec!["deque".to_string()]
        ));
    }

    #[tokio::test]
    async fn test_build_no_expect_kinds() {
        let client = ClientBuilder::new(connector()).register::<Blob>().unwrap().build();
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_build_rejects_bad_config() {
        let mut config = ClientConfig::default();
        config.timeout_ms = 10;
        let client = ClientBuilder::new(connector()).config(config).build();
        assert!(matches!(client, Err(BuildError::Config(ConfigError::TimeoutTooSmall(10)))));
    }

    #[test]
    fn test_build_outside_runtime() {
        let client = ClientBuilder::new(connector()).build();
        assert!(matches!(client, Err(BuildError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_built_client_round_trip() {
        let client = ClientBuilder::new(connector()).with_standard_kinds().unwrap().build().unwrap();
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));

        let ok = std::rc::Rc::clone(&seen);
        client
            .cluster
            .connect(
                &client.dispatcher,
                vec![
                    crate::domain::Value::function(move |_| ok.borrow_mut().push("connected")),
                    crate::domain::Value::function(|_| panic!("connect failed")),
                ],
            )
            .unwrap();
        client.dispatcher.run_until_idle().await;

        let counter = client.cluster.entity(&client.registry, "integer", "n").unwrap();
        let put = std::rc::Rc::clone(&seen);
        counter
            .invoke(
                &client.dispatcher,
                "put",
                vec![
                    crate::domain::Value::from(3i64),
                    crate::domain::Value::function(move |argv| {
                        assert!(argv[0].is_null());
                        put.borrow_mut().push("put");
                    }),
                ],
            )
            .unwrap();
        client.dispatcher.run_until_idle().await;

        assert_eq!(*seen.borrow(), vec!["connected", "put"]);
    }
}
