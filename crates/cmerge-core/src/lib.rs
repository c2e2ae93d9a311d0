//! Counter merge procedure for cmerge.
//!
//! Game counters are stored per server shard under keys like
//! `gameapi:counter:p8:p8_counter_1_{shard}_1_{suffix}`. When two shards are
//! merged, every counter of the source shard is added into the matching
//! counter of the destination shard.
//!
//! # Modules
//!
//! - [`config`] — Namespace and merge configuration, `cmerge.toml` loading
//! - [`key`] — [`KeySchema`] encoder/decoder for counter keys
//! - [`scan`] — [`KeyScanner`] cursor walk and counter value decoding
//! - [`merge`] — [`CounterMerger`] and the per-key [`MergeRecord`]s it reports
//! - [`error`] — [`ConfigError`] and [`MergeError`]

pub mod config;
pub mod error;
pub mod key;
pub mod merge;
pub mod scan;

pub use config::{AppConfig, MergeConfig, MergeSection, NamespaceConfig};
pub use error::{ConfigError, MergeError, MergeResult};
pub use key::{CounterKey, KeySchema};
pub use merge::{CounterMerger, MergeRecord, MergeReport};
pub use scan::{parse_counter, scan_counters, CounterEntry, KeyScanner};
