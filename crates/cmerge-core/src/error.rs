//! Error types for configuration and the merge procedure.

use std::path::PathBuf;

use cmerge_store::StoreError;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A namespace segment is empty or contains a forbidden character.
    #[error("invalid {field} {value:?}: {reason}")]
    InvalidSegment {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// Source and destination shard are the same.
    #[error("source and destination shard are both {0}")]
    SameShard(u32),

    /// Scan batch hint must be positive.
    #[error("scan_count must be greater than zero")]
    ZeroScanCount,

    /// Config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// Config could not be rendered for display.
    #[error("failed to render config: {0}")]
    Render(String),
}

/// Errors that abort a merge run.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The store failed; the whole run is aborted.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A stored value is not a decimal integer.
    #[error("value of {key} is not an integer: {value:?}")]
    Decode { key: String, value: String },

    /// A scanned key does not fit the counter key layout.
    #[error("key {key} does not match the counter schema: {reason}")]
    KeySchema { key: String, reason: String },

    /// The sum does not fit in a signed 64-bit integer.
    #[error("counter overflow merging {key}: {merge_value} + {dest_value}")]
    Overflow {
        key: String,
        merge_value: i64,
        dest_value: i64,
    },

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Convenience type alias for merge operations.
pub type MergeResult<T> = std::result::Result<T, MergeError>;
