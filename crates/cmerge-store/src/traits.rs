use async_trait::async_trait;

use crate::error::StoreResult;

/// Cursor value that both starts a scan and signals its completion.
pub const SCAN_START: u64 = 0;

/// One batch returned by a single scan step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanBatch {
    /// Cursor to pass to the next step; [`SCAN_START`] means the scan is done.
    pub cursor: u64,
    /// Keys matching the pattern in this batch. May be empty.
    pub keys: Vec<String>,
}

impl ScanBatch {
    /// Whether the store signalled the end of the scan.
    pub fn is_last(&self) -> bool {
        self.cursor == SCAN_START
    }
}

/// String key-value store with cursor-based pattern scanning.
///
/// All implementations must satisfy these invariants:
/// - `scan` covers the full key space: repeatedly feeding the returned cursor
///   back until it is [`SCAN_START`] visits every key that existed for the
///   whole duration of the scan.
/// - `scan` may return empty batches and may return a key more than once.
/// - `get` returns `Ok(None)` for an absent key, never an error.
/// - Connection and protocol failures are returned, never retried.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Run one scan step from `cursor` over keys matching the glob `pattern`.
    ///
    /// `count` is a hint for how much of the key space to examine per step.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> StoreResult<ScanBatch>;

    /// Read the value stored at `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` at `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;
}
