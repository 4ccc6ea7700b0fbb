//! ClientConfig - 接続設定
//!
//! 環境変数か JSON から読み込みます。
//!
//! | 変数 | 既定値 |
//! |---|---|
//! | `SHUTTLE_URI` | `qdb://127.0.0.1:2836` |
//! | `SHUTTLE_TIMEOUT_MS` | `60000` |
//! | `SHUTTLE_CLUSTER_PUBLIC_KEY_FILE` | なし |
//! | `SHUTTLE_USER_PRIVATE_KEY_FILE` | なし |

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_URI: &str = "qdb://127.0.0.1:2836";
pub const DEFAULT_TIMEOUT_MS: u32 = 60_000;
/// これ未満の timeout は受け付けない
pub const MIN_TIMEOUT_MS: u32 = 1_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timeout must be at least {MIN_TIMEOUT_MS}ms, got {0}ms")]
    TimeoutTooSmall(u32),

    #[error("cluster public key and user private key files must be configured together")]
    UnpairedCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub uri: String,
    pub timeout_ms: u32,
    pub cluster_public_key_file: Option<PathBuf>,
    pub user_private_key_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            cluster_public_key_file: None,
            user_private_key_file: None,
        }
    }
}

impl ClientConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// 環境変数から読む。未設定・解釈できない値は既定値
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let uri = lookup("SHUTTLE_URI")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_URI.to_string());

        let timeout_ms = lookup("SHUTTLE_TIMEOUT_MS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        let cluster_public_key_file = lookup("SHUTTLE_CLUSTER_PUBLIC_KEY_FILE").map(PathBuf::from);
        let user_private_key_file = lookup("SHUTTLE_USER_PRIVATE_KEY_FILE").map(PathBuf::from);

        Self {
            uri,
            timeout_ms,
            cluster_public_key_file,
            user_private_key_file,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_credentials(
        mut self,
        cluster_public_key_file: impl Into<PathBuf>,
        user_private_key_file: impl Into<PathBuf>,
    ) -> Self {
        self.cluster_public_key_file = Some(cluster_public_key_file.into());
        self.user_private_key_file = Some(user_private_key_file.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < MIN_TIMEOUT_MS {
            return Err(ConfigError::TimeoutTooSmall(self.timeout_ms));
        }
        if self.cluster_public_key_file.is_some() != self.user_private_key_file.is_some() {
            return Err(ConfigError::UnpairedCredentials);
        }
        Ok(())
    }

    /// 両方の鍵ファイルが設定されているか
    pub fn is_secured(&self) -> bool {
        self.cluster_public_key_file.is_some() && self.user_private_key_file.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = ClientConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.uri, DEFAULT_URI);
        assert!(!config.is_secured());
    }

    #[test]
    fn env_values_override_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("SHUTTLE_URI", "qdb://10.0.0.7:2836"),
            ("SHUTTLE_TIMEOUT_MS", "5000"),
            ("SHUTTLE_CLUSTER_PUBLIC_KEY_FILE", "/etc/qdb/cluster.key"),
            ("SHUTTLE_USER_PRIVATE_KEY_FILE", "/etc/qdb/user.json"),
        ]));
        assert_eq!(config.uri, "qdb://10.0.0.7:2836");
        assert_eq!(config.timeout_ms, 5000);
        assert!(config.is_secured());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unparsable_timeout_falls_back() {
        let config = ClientConfig::from_lookup(lookup(&[("SHUTTLE_TIMEOUT_MS", "soon")]));
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn json_is_validated() {
        let config = ClientConfig::from_json(r#"{"uri": "qdb://h:1", "timeout_ms": 2000}"#).unwrap();
        assert_eq!(config.timeout_ms, 2000);

        let err = ClientConfig::from_json(r#"{"timeout_ms": 10}"#).unwrap_err();
        assert!(matches!(err, ConfigError::TimeoutTooSmall(10)));

        let err = ClientConfig::from_json(r#"{"cluster_public_key_file": "a"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::UnpairedCredentials));

        assert!(matches!(ClientConfig::from_json("{"), Err(ConfigError::Json(_))));
    }
}
