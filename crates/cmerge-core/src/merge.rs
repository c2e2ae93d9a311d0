//! Shard-to-shard counter merge.
//!
//! Every counter of the source shard is added into the counter with the same
//! suffix on the destination shard:
//!
//! 1. scan `{prefix}{source}_{scope}_*` and read each value;
//! 2. map each key onto the destination shard through [`KeySchema`];
//! 3. read the destination value (absent = 0) and add;
//! 4. write the sum only if it is greater than zero.
//!
//! Source keys are never modified or deleted, so running the same merge twice
//! adds the source values twice. Nothing is rolled back if a run aborts
//! midway.

use std::fmt;

use cmerge_store::KvStore;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::MergeConfig;
use crate::error::{MergeError, MergeResult};
use crate::key::KeySchema;
use crate::scan::{parse_counter, scan_counters, CounterEntry};

/// Outcome for one source counter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MergeRecord {
    pub merge_key: String,
    pub merge_value: i64,
    pub dest_key: String,
    pub dest_value: i64,
    pub new_value: i64,
    /// Whether `new_value` was written to `dest_key`.
    pub written: bool,
}

impl fmt::Display for MergeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "merge_key={} merge_value={} dest_key={} dest_value={} new_value={}",
            self.merge_key, self.merge_value, self.dest_key, self.dest_value, self.new_value
        )?;
        if !self.written {
            write!(f, " (not written)")?;
        }
        Ok(())
    }
}

/// All records of one run, in processing order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub source_id: u32,
    pub dest_id: u32,
    pub dry_run: bool,
    pub records: Vec<MergeRecord>,
}

impl MergeReport {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn written_count(&self) -> usize {
        self.records.iter().filter(|r| r.written).count()
    }

    /// Records whose destination was left alone.
    pub fn skipped_count(&self) -> usize {
        self.len() - self.written_count()
    }
}

/// Folds the counters of one shard into another.
pub struct CounterMerger<'a, S: KvStore + ?Sized> {
    store: &'a S,
    schema: KeySchema,
    config: MergeConfig,
}

impl<'a, S: KvStore + ?Sized> CounterMerger<'a, S> {
    /// Validate `config` and bind it to `store`.
    pub fn new(store: &'a S, config: MergeConfig) -> MergeResult<Self> {
        config.validate()?;
        let schema = KeySchema::new(&config.namespace)?;
        Ok(Self {
            store,
            schema,
            config,
        })
    }

    /// Glob selecting the source shard's counters.
    pub fn scan_pattern(&self) -> String {
        self.schema.scan_pattern(self.config.source_id)
    }

    /// Run the merge and return one record per source counter.
    ///
    /// The first store, decode, or overflow error aborts the run. Writes
    /// already made stay in place.
    pub async fn merge(&self) -> MergeResult<MergeReport> {
        let pattern = self.scan_pattern();
        info!(
            pattern = %pattern,
            source = self.config.source_id,
            dest = self.config.dest_id,
            dry_run = self.config.dry_run,
            "starting counter merge"
        );

        let entries = scan_counters(self.store, &pattern, self.config.scan_count).await?;

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            records.push(self.merge_one(entry).await?);
        }

        let report = MergeReport {
            source_id: self.config.source_id,
            dest_id: self.config.dest_id,
            dry_run: self.config.dry_run,
            records,
        };
        info!(
            merged = report.len(),
            written = report.written_count(),
            skipped = report.skipped_count(),
            "counter merge finished"
        );
        Ok(report)
    }

    async fn merge_one(&self, entry: CounterEntry) -> MergeResult<MergeRecord> {
        let decoded = self.schema.decode(&entry.key)?;
        if decoded.shard != self.config.source_id {
            return Err(MergeError::KeySchema {
                key: entry.key,
                reason: format!(
                    "shard {} is not the source shard {}",
                    decoded.shard, self.config.source_id
                ),
            });
        }
        let dest_key = self.schema.encode(&decoded.with_shard(self.config.dest_id));

        let raw = self.store.get(&dest_key).await?;
        let dest_value = parse_counter(&dest_key, raw.as_deref())?;

        let new_value = entry
            .value
            .checked_add(dest_value)
            .ok_or_else(|| MergeError::Overflow {
                key: entry.key.clone(),
                merge_value: entry.value,
                dest_value,
            })?;

        let written = new_value > 0 && !self.config.dry_run;
        if written {
            self.store.set(&dest_key, &new_value.to_string()).await?;
        } else if new_value <= 0 {
            warn!(
                key = %entry.key,
                dest = %dest_key,
                new_value,
                "sum not positive, destination left unchanged"
            );
        }
        debug!(
            key = %entry.key,
            dest = %dest_key,
            merge_value = entry.value,
            dest_value,
            new_value,
            written,
            "merged counter"
        );

        Ok(MergeRecord {
            merge_key: entry.key,
            merge_value: entry.value,
            dest_key,
            dest_value,
            new_value,
            written,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use cmerge_store::{InMemoryKvStore, ScanBatch, StoreError, StoreResult};

    use super::*;
    use crate::config::NamespaceConfig;
    use crate::error::ConfigError;

    /// Delegates to an in-memory store but drops the connection on the
    /// `fail_on_set`-th write (1-based).
    struct FlakyStore {
        inner: InMemoryKvStore,
        fail_on_set: usize,
        sets: AtomicUsize,
    }

    #[async_trait]
    impl KvStore for FlakyStore {
        async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> StoreResult<ScanBatch> {
            self.inner.scan(cursor, pattern, count).await
        }
        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
            if self.sets.fetch_add(1, Ordering::Relaxed) + 1 == self.fail_on_set {
                return Err(StoreError::ConnectionClosed);
            }
            self.inner.set(key, value).await
        }
    }

    const SRC_X: &str = "db:counter:p8:p8_counter_1_2_1_x";
    const DST_X: &str = "db:counter:p8:p8_counter_1_1_1_x";

    fn namespace() -> NamespaceConfig {
        NamespaceConfig {
            database: "db".into(),
            domain: "p8".into(),
            scope: "1".into(),
        }
    }

    fn config() -> MergeConfig {
        MergeConfig::new(namespace(), 2, 1)
    }

    async fn run(store: &InMemoryKvStore, config: MergeConfig) -> MergeReport {
        CounterMerger::new(store, config)
            .unwrap()
            .merge()
            .await
            .unwrap()
    }

    // -----------------------------------------------------------------------
    // Sums
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn adds_source_into_existing_destination() {
        let store = InMemoryKvStore::with_entries([(SRC_X, "5"), (DST_X, "10")]);
        let report = run(&store, config()).await;

        assert_eq!(store.value(DST_X).as_deref(), Some("15"));
        assert_eq!(
            report.records,
            vec![MergeRecord {
                merge_key: SRC_X.into(),
                merge_value: 5,
                dest_key: DST_X.into(),
                dest_value: 10,
                new_value: 15,
                written: true,
            }]
        );
    }

    #[tokio::test]
    async fn creates_missing_destination() {
        let store = InMemoryKvStore::with_entries([(SRC_X, "3")]);
        let report = run(&store, config()).await;

        assert_eq!(store.value(DST_X).as_deref(), Some("3"));
        assert_eq!(report.records[0].dest_value, 0);
        assert_eq!(report.written_count(), 1);
    }

    #[tokio::test]
    async fn zero_sum_is_not_written() {
        let store = InMemoryKvStore::with_entries([(SRC_X, "0")]);
        let report = run(&store, config()).await;

        assert_eq!(store.value(DST_X), None);
        assert_eq!(store.set_calls(), 0);
        assert_eq!(report.records[0].new_value, 0);
        assert!(!report.records[0].written);
        assert_eq!(report.skipped_count(), 1);
    }

    #[tokio::test]
    async fn negative_sum_leaves_destination_unchanged() {
        let store = InMemoryKvStore::with_entries([(SRC_X, "-8"), (DST_X, "5")]);
        let report = run(&store, config()).await;

        assert_eq!(store.value(DST_X).as_deref(), Some("5"));
        assert_eq!(report.records[0].new_value, -3);
        assert!(!report.records[0].written);
    }

    #[tokio::test]
    async fn source_keys_are_left_in_place() {
        let store = InMemoryKvStore::with_entries([(SRC_X, "5"), (DST_X, "10")]);
        run(&store, config()).await;
        assert_eq!(store.value(SRC_X).as_deref(), Some("5"));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn running_twice_adds_twice() {
        let store = InMemoryKvStore::with_entries([(SRC_X, "5"), (DST_X, "10")]);
        run(&store, config()).await;
        run(&store, config()).await;
        assert_eq!(store.value(DST_X).as_deref(), Some("20"));
    }

    #[tokio::test]
    async fn other_shards_and_namespaces_untouched() {
        let store = InMemoryKvStore::with_entries([
            (SRC_X, "5"),
            ("db:counter:p8:p8_counter_1_3_1_x", "100"),
            ("db:counter:p8:p8_counter_1_22_1_x", "100"),
            ("db:counter:p9:p9_counter_1_2_1_x", "100"),
            ("db:counter:p8:p8_counter_1_2_2_x", "100"),
        ]);
        let before = store.snapshot();
        let report = run(&store, config()).await;

        assert_eq!(report.len(), 1);
        let after = store.snapshot();
        for (k, v) in &before {
            assert_eq!(after.get(k), Some(v), "{k} changed");
        }
        assert_eq!(after.get(DST_X).map(String::as_str), Some("5"));
    }

    // -----------------------------------------------------------------------
    // Scanning
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn merges_keys_spread_over_many_batches() {
        let mut pairs = Vec::new();
        for i in 0..7 {
            pairs.push((format!("db:counter:p8:p8_counter_1_2_1_item{i}"), (i + 1).to_string()));
            pairs.push((format!("db:counter:p8:p8_counter_1_1_1_item{i}"), "100".to_string()));
        }
        let store = InMemoryKvStore::with_entries(pairs);
        let mut cfg = config();
        cfg.scan_count = 2;
        let report = run(&store, cfg).await;

        assert!(store.scan_calls() >= 3);
        assert_eq!(report.len(), 7);
        for i in 0..7 {
            let dest = format!("db:counter:p8:p8_counter_1_1_1_item{i}");
            assert_eq!(store.value(&dest), Some((101 + i).to_string()));
        }
    }

    #[tokio::test]
    async fn empty_source_shard_is_noop() {
        let store = InMemoryKvStore::with_entries([(DST_X, "10")]);
        let report = run(&store, config()).await;
        assert!(report.is_empty());
        assert_eq!(store.value(DST_X).as_deref(), Some("10"));
    }

    // -----------------------------------------------------------------------
    // Dry run
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn dry_run_reports_without_writing() {
        let store = InMemoryKvStore::with_entries([(SRC_X, "5"), (DST_X, "10")]);
        let mut cfg = config();
        cfg.dry_run = true;
        let report = run(&store, cfg).await;

        assert!(report.dry_run);
        assert_eq!(report.records[0].new_value, 15);
        assert!(!report.records[0].written);
        assert_eq!(store.value(DST_X).as_deref(), Some("10"));
        assert_eq!(store.set_calls(), 0);
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn malformed_source_value_aborts() {
        let store = InMemoryKvStore::with_entries([(SRC_X, "lots")]);
        let err = CounterMerger::new(&store, config())
            .unwrap()
            .merge()
            .await
            .unwrap_err();
        assert!(matches!(err, MergeError::Decode { ref key, .. } if key == SRC_X));
    }

    #[tokio::test]
    async fn malformed_destination_value_aborts() {
        let store = InMemoryKvStore::with_entries([(SRC_X, "1"), (DST_X, "n/a")]);
        let err = CounterMerger::new(&store, config())
            .unwrap()
            .merge()
            .await
            .unwrap_err();
        assert!(matches!(err, MergeError::Decode { ref key, .. } if key == DST_X));
        assert_eq!(store.set_calls(), 0);
    }

    #[tokio::test]
    async fn store_failure_aborts_and_keeps_earlier_writes() {
        const SRC_Y: &str = "db:counter:p8:p8_counter_1_2_1_y";
        const DST_Y: &str = "db:counter:p8:p8_counter_1_1_1_y";
        let store = FlakyStore {
            inner: InMemoryKvStore::with_entries([
                (SRC_X, "5"),
                (DST_X, "10"),
                (SRC_Y, "4"),
                (DST_Y, "1"),
            ]),
            fail_on_set: 2,
            sets: AtomicUsize::new(0),
        };

        let err = CounterMerger::new(&store, config())
            .unwrap()
            .merge()
            .await
            .unwrap_err();

        assert!(matches!(err, MergeError::Store(StoreError::ConnectionClosed)));
        // Keys are processed in scan order: x first, then y.
        assert_eq!(store.inner.value(DST_X).as_deref(), Some("15"));
        assert_eq!(store.inner.value(DST_Y).as_deref(), Some("1"));
        assert_eq!(store.inner.value(SRC_Y).as_deref(), Some("4"));
    }

    #[tokio::test]
    async fn overflow_aborts() {
        let max = i64::MAX.to_string();
        let store = InMemoryKvStore::with_entries([(SRC_X, "1"), (DST_X, max.as_str())]);
        let err = CounterMerger::new(&store, config())
            .unwrap()
            .merge()
            .await
            .unwrap_err();
        assert!(matches!(err, MergeError::Overflow { .. }));
    }

    #[test]
    fn rejects_same_source_and_destination() {
        let store = InMemoryKvStore::new();
        let result = CounterMerger::new(&store, MergeConfig::new(namespace(), 1, 1));
        assert!(matches!(
            result,
            Err(MergeError::Config(ConfigError::SameShard(1)))
        ));
    }

    #[test]
    fn scan_pattern_targets_source_shard() {
        let store = InMemoryKvStore::new();
        let merger = CounterMerger::new(&store, config()).unwrap();
        assert_eq!(merger.scan_pattern(), "db:counter:p8:p8_counter_1_2_1_*");
    }

    #[test]
    fn record_display() {
        let r = MergeRecord {
            merge_key: "a".into(),
            merge_value: 0,
            dest_key: "b".into(),
            dest_value: 0,
            new_value: 0,
            written: false,
        };
        assert_eq!(
            r.to_string(),
            "merge_key=a merge_value=0 dest_key=b dest_value=0 new_value=0 (not written)"
        );
    }

    #[test]
    fn report_serializes_to_json() {
        let report = MergeReport {
            source_id: 2,
            dest_id: 1,
            dry_run: false,
            records: vec![],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["source_id"], 2);
        assert_eq!(json["records"], serde_json::json!([]));
    }
}
