//! RESP2 client for Redis-compatible servers.
//!
//! Commands are sent as arrays of bulk strings over a single connection framed
//! with the `redis-protocol` codec. Requests are strictly sequential: the
//! connection sits behind an async mutex and every command waits for its reply
//! before the next one is written.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use redis_protocol::codec::Resp2;
use redis_protocol::resp2::types::{BytesFrame, Resp2Frame};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::Framed;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::traits::{KvStore, ScanBatch};

/// Network-backed [`KvStore`] speaking RESP2.
pub struct RespKvStore {
    addr: String,
    conn: Mutex<Framed<TcpStream, Resp2>>,
}

impl RespKvStore {
    /// Connect, authenticate, and select the configured database.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let addr = config.addr();
        let timeout = Duration::from_millis(config.connect_timeout_ms);
        let socket = match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(socket)) => socket,
            Ok(Err(e)) => {
                return Err(StoreError::Connect {
                    addr,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(StoreError::Timeout {
                    addr,
                    millis: config.connect_timeout_ms,
                })
            }
        };
        socket.set_nodelay(true)?;

        let store = Self {
            addr,
            conn: Mutex::new(Framed::new(socket, Resp2::default())),
        };

        if let Some(password) = &config.password {
            let mut args = vec!["AUTH"];
            if let Some(user) = &config.username {
                args.push(user.as_str());
            }
            args.push(password.as_str());
            store.expect_ok(&args).await?;
        }
        if config.db != 0 {
            let db = config.db.to_string();
            store.expect_ok(&["SELECT", db.as_str()]).await?;
        }

        info!(addr = %store.addr, db = config.db, "connected to store");
        Ok(store)
    }

    /// Send one command and wait for its reply. Error replies become
    /// [`StoreError::Server`].
    async fn request(&self, args: &[&str]) -> StoreResult<BytesFrame> {
        let command = command_name(args);
        let frame = BytesFrame::Array(
            args.iter()
                .map(|a| BytesFrame::BulkString(Bytes::copy_from_slice(a.as_bytes())))
                .collect(),
        );

        let mut conn = self.conn.lock().await;
        conn.send(frame)
            .await
            .map_err(|e| StoreError::Protocol(e.to_string()))?;
        let reply = conn
            .next()
            .await
            .ok_or(StoreError::ConnectionClosed)?
            .map_err(|e| StoreError::Protocol(e.to_string()))?;

        if let BytesFrame::Error(msg) = &reply {
            let message: &str = msg;
            return Err(StoreError::Server {
                command,
                message: message.to_string(),
            });
        }
        Ok(reply)
    }

    async fn expect_ok(&self, args: &[&str]) -> StoreResult<()> {
        let reply = self.request(args).await?;
        match &reply {
            BytesFrame::SimpleString(s) if &s[..] == b"OK" => Ok(()),
            other => Err(unexpected(args, other)),
        }
    }
}

#[async_trait]
impl KvStore for RespKvStore {
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> StoreResult<ScanBatch> {
        let cursor_arg = cursor.to_string();
        let count_arg = count.max(1).to_string();
        let args = [
            "SCAN",
            cursor_arg.as_str(),
            "MATCH",
            pattern,
            "COUNT",
            count_arg.as_str(),
        ];
        let reply = self.request(&args).await?;

        let BytesFrame::Array(parts) = &reply else {
            return Err(unexpected(&args, &reply));
        };
        let [next, keys] = parts.as_slice() else {
            return Err(unexpected(&args, &reply));
        };
        let next = next
            .as_str()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| unexpected(&args, &reply))?;
        let BytesFrame::Array(keys) = keys else {
            return Err(unexpected(&args, &reply));
        };
        let keys = keys
            .iter()
            .map(frame_string)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| unexpected(&args, &reply))?;

        debug!(cursor, next, batch = keys.len(), "scan step");
        Ok(ScanBatch { cursor: next, keys })
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let args = ["GET", key];
        let reply = self.request(&args).await?;
        match &reply {
            BytesFrame::Null => Ok(None),
            other => frame_string(other)
                .map(Some)
                .ok_or_else(|| unexpected(&args, other)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.expect_ok(&["SET", key, value]).await
    }
}

impl std::fmt::Debug for RespKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RespKvStore")
            .field("addr", &self.addr)
            .finish()
    }
}

fn command_name(args: &[&str]) -> String {
    args.first()
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or_default()
}

fn unexpected(args: &[&str], reply: &BytesFrame) -> StoreError {
    StoreError::UnexpectedReply {
        command: command_name(args),
        reply: format!("{reply:?}"),
    }
}

fn frame_string(frame: &BytesFrame) -> Option<String> {
    match frame {
        BytesFrame::BulkString(b) | BytesFrame::SimpleString(b) => {
            String::from_utf8(b.to_vec()).ok()
        }
        _ => None,
    }
}
