//! Key-value store access for cmerge.
//!
//! Counters live in a Redis-compatible store as decimal-integer strings. This
//! crate hides the store behind the [`KvStore`] trait so the merge procedure
//! can run against a live server or an in-memory map with identical
//! semantics.
//!
//! # Operations
//!
//! - `scan` -- one step of a cursor-based pattern scan (Redis `SCAN`)
//! - `get` -- read a key, `None` when absent
//! - `set` -- write a key
//!
//! # Backends
//!
//! - [`InMemoryKvStore`] -- sorted map for tests and embedding
//! - [`RespKvStore`] -- RESP2 client for Redis-compatible servers
//!
//! # Design Rules
//!
//! 1. A scan is complete only once the store hands back cursor `0`.
//! 2. Batches may be empty while the cursor is non-zero.
//! 3. The store never interprets values -- it moves strings.
//! 4. All connection and protocol errors are propagated, never retried.

pub mod config;
pub mod error;
pub mod memory;
pub mod resp;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryKvStore;
pub use resp::RespKvStore;
pub use traits::{KvStore, ScanBatch, SCAN_START};
