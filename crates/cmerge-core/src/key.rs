//! Counter key layout.
//!
//! Counter keys look like
//!
//! ```text
//! {database}:counter:{domain}:{domain}_counter_1_{shard}_{scope}_{suffix}
//! ```
//!
//! The part up to and including `_counter_1_` is the namespace prefix. The
//! shard is an unsigned decimal server id with no leading zeros, `scope` is
//! a fixed segment, and the suffix is opaque. Moving a counter to another
//! shard decodes the key, swaps the shard field, and encodes again, so a
//! suffix that happens to contain the prefix is never touched.
//!
//! Namespace segments are validated up front: they must not contain glob
//! metacharacters, whitespace, or `:`, which lets the scan pattern be built
//! without escaping.

use crate::config::NamespaceConfig;
use crate::error::{ConfigError, MergeError, MergeResult};

/// Characters that are forbidden anywhere in a namespace segment.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '*', '?', '[', ']', '\\', ':'];

/// Validate one namespace segment, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use cmerge_core::key::validate_segment;
///
/// assert!(validate_segment("domain", "p8").is_ok());
/// assert!(validate_segment("domain", "").is_err());
/// assert!(validate_segment("domain", "p*").is_err());
/// ```
pub fn validate_segment(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::InvalidSegment {
            field,
            value: value.to_string(),
            reason: "must not be empty".into(),
        });
    }

    for ch in FORBIDDEN_CHARS {
        if value.contains(*ch) {
            return Err(ConfigError::InvalidSegment {
                field,
                value: value.to_string(),
                reason: format!("contains forbidden character: {ch:?}"),
            });
        }
    }

    Ok(())
}

/// A counter key split into the fields that vary between keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterKey {
    pub shard: u32,
    pub suffix: String,
}

impl CounterKey {
    pub fn new(shard: u32, suffix: impl Into<String>) -> Self {
        Self {
            shard,
            suffix: suffix.into(),
        }
    }

    /// Same counter on another shard.
    pub fn with_shard(&self, shard: u32) -> Self {
        Self {
            shard,
            suffix: self.suffix.clone(),
        }
    }
}

/// Encoder/decoder for counter keys of one namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySchema {
    prefix: String,
    scope: String,
}

impl KeySchema {
    /// Build a schema from validated namespace segments.
    pub fn new(namespace: &NamespaceConfig) -> Result<Self, ConfigError> {
        namespace.validate()?;
        Ok(Self {
            prefix: format!(
                "{db}:counter:{domain}:{domain}_counter_1_",
                db = namespace.database,
                domain = namespace.domain,
            ),
            scope: namespace.scope.clone(),
        })
    }

    /// Namespace prefix shared by every counter key.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Glob matching every counter of `shard`.
    pub fn scan_pattern(&self, shard: u32) -> String {
        format!("{}{}_{}_*", self.prefix, shard, self.scope)
    }

    pub fn encode(&self, key: &CounterKey) -> String {
        format!("{}{}_{}_{}", self.prefix, key.shard, self.scope, key.suffix)
    }

    /// Split `key` into shard and suffix.
    pub fn decode(&self, key: &str) -> MergeResult<CounterKey> {
        let schema_err = |reason: String| MergeError::KeySchema {
            key: key.to_string(),
            reason,
        };

        let rest = key
            .strip_prefix(self.prefix.as_str())
            .ok_or_else(|| schema_err(format!("missing prefix {:?}", self.prefix)))?;

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (shard, rest) = rest.split_at(digits);
        if shard.is_empty() {
            return Err(schema_err("missing shard id".into()));
        }
        if shard.len() > 1 && shard.starts_with('0') {
            return Err(schema_err(format!("shard id {shard:?} has a leading zero")));
        }
        let shard = shard
            .parse::<u32>()
            .map_err(|e| schema_err(format!("shard id {shard:?}: {e}")))?;

        let suffix = rest
            .strip_prefix('_')
            .and_then(|r| r.strip_prefix(self.scope.as_str()))
            .and_then(|r| r.strip_prefix('_'))
            .ok_or_else(|| schema_err(format!("missing scope segment _{}_", self.scope)))?;

        Ok(CounterKey::new(shard, suffix))
    }

    /// Re-encode `key` on shard `to`.
    pub fn remap(&self, key: &str, to: u32) -> MergeResult<String> {
        let decoded = self.decode(key)?;
        Ok(self.encode(&decoded.with_shard(to)))
    }
}
