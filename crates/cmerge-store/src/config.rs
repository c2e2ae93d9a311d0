use serde::{Deserialize, Serialize};

const REDACTED: &str = "********";

/// Connection parameters for a Redis-compatible store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    /// ACL user name. Only sent when a password is also set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Logical database index selected after connecting.
    pub db: u32,
    pub connect_timeout_ms: u64,
    /// `COUNT` hint passed to every scan step.
    pub scan_count: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 6379,
            username: None,
            password: None,
            db: 0,
            connect_timeout_ms: 5_000,
            scan_count: 100,
        }
    }
}

impl StoreConfig {
    /// `host:port` string used for connecting and in error messages.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Copy of this config with the password masked, for display.
    pub fn redacted(&self) -> Self {
        Self {
            password: self.password.as_ref().map(|_| REDACTED.to_string()),
            ..self.clone()
        }
    }
}
