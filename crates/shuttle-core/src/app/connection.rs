//! ConnectionHandle - 共有される native handle
//!
//! # 並行性
//! native handle は丸ごと置き換えるだけで、その場で書き換えません。
//! 読む側は lock → clone → unlock してから使います（snapshot）。
//! lock 中にネイティブ呼び出しはしません。

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Deserialize;
use ulid::Ulid;

use crate::config::{ClientConfig, MIN_TIMEOUT_MS};
use crate::domain::errors::ErrorCode;
use crate::domain::ids::ConnectionId;
use crate::ports::{Credentials, NativeConnector, NativeSession};

pub struct ConnectionHandle {
    id: ConnectionId,
    config: ClientConfig,
    inner: Mutex<Inner>,
}

struct Inner {
    timeout_ms: u32,
    session: Option<Arc<dyn NativeSession>>,
}

/// user private key ファイルの中身
#[derive(Deserialize)]
struct UserKeyFile {
    username: String,
    secret_key: String,
}

impl ConnectionHandle {
    /// 未接続の handle を作る
    pub fn new(config: ClientConfig) -> Self {
        let timeout_ms = config.timeout_ms.max(MIN_TIMEOUT_MS);
        Self {
            id: ConnectionId::from_ulid(Ulid::new()),
            config,
            inner: Mutex::new(Inner {
                timeout_ms,
                session: None,
            }),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.config.uri
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 新しい native handle を開いて置き換える
    ///
    /// ブロッキング。worker スレッドから呼ばれる前提です。
    /// 失敗した場合、既存の handle はそのまま残ります。
    pub fn connect(&self, connector: &dyn NativeConnector) -> Result<(), ErrorCode> {
        let credentials = if self.config.is_secured() {
            Some(self.load_credentials()?)
        } else {
            None
        };

        let timeout_ms = self.timeout();
        let session = connector.open(&self.config.uri, credentials.as_ref())?;
        let status = session.set_timeout(timeout_ms);
        if !status.is_success() {
            return Err(status);
        }

        // 置き換えまでの間に set_timeout されていれば新しい handle にも反映する
        let (previous, latest_ms) = {
            let mut inner = self.lock();
            (inner.session.replace(Arc::clone(&session)), inner.timeout_ms)
        };
        if latest_ms != timeout_ms {
            let status = session.set_timeout(latest_ms);
            if !status.is_success() {
                tracing::warn!(connection = %self.id, timeout_ms = latest_ms, error = %status, "cannot apply timeout");
            }
        }
        tracing::debug!(
            connection = %self.id,
            uri = %self.config.uri,
            timeout_ms = latest_ms,
            reconnected = previous.is_some(),
            "native handle replaced"
        );
        Ok(())
    }

    /// timeout を変更する。接続済みなら即座に native handle にも反映
    pub fn set_timeout(&self, timeout_ms: u32) -> Result<(), ErrorCode> {
        if timeout_ms < MIN_TIMEOUT_MS {
            return Err(ErrorCode::INVALID_ARGUMENT);
        }
        let session = {
            let mut inner = self.lock();
            inner.timeout_ms = timeout_ms;
            inner.session.clone()
        };
        match session {
            Some(session) => {
                let status = session.set_timeout(timeout_ms);
                if status.is_success() { Ok(()) } else { Err(status) }
            }
            None => Ok(()),
        }
    }

    pub fn timeout(&self) -> u32 {
        self.lock().timeout_ms
    }

    /// 現在の native handle。未接続なら `None`
    pub fn snapshot(&self) -> Option<Arc<dyn NativeSession>> {
        self.lock().session.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().session.is_some()
    }

    fn load_credentials(&self) -> Result<Credentials, ErrorCode> {
        let (Some(cluster_key), Some(user_key)) = (
            self.config.cluster_public_key_file.as_deref(),
            self.config.user_private_key_file.as_deref(),
        ) else {
            return Err(ErrorCode::INVALID_CREDENTIALS);
        };
        read_credentials(cluster_key, user_key).inspect_err(|_| {
            tracing::warn!(
                connection = %self.id,
                cluster_key = %cluster_key.display(),
                user_key = %user_key.display(),
                "cannot read credential files"
            );
        })
    }
}

fn read_credentials(cluster_key: &Path, user_key: &Path) -> Result<Credentials, ErrorCode> {
    let cluster_public_key = std::fs::read_to_string(cluster_key)
        .map_err(|_| ErrorCode::INVALID_CREDENTIALS)?
        .trim()
        .to_string();
    if cluster_public_key.is_empty() {
        return Err(ErrorCode::INVALID_CREDENTIALS);
    }

    let user_json = std::fs::read_to_string(user_key).map_err(|_| ErrorCode::INVALID_CREDENTIALS)?;
    let user: UserKeyFile =
        serde_json::from_str(&user_json).map_err(|_| ErrorCode::INVALID_CREDENTIALS)?;

    Ok(Credentials {
        cluster_public_key,
        user_name: user.username,
        user_private_key: user.secret_key,
    })
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("uri", &self.config.uri)
            .field("timeout_ms", &self.timeout())
            .field("connected", &self.is_connected())
            .finish()
    }
}
