use std::path::Path;

use cmerge_store::StoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::key::validate_segment;

/// Identifies the counter namespace inside the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
    pub database: String,
    pub domain: String,
    pub scope: String,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            database: "gameapi".into(),
            domain: "p8".into(),
            scope: "1".into(),
        }
    }
}

impl NamespaceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_segment("database", &self.database)?;
        validate_segment("domain", &self.domain)?;
        validate_segment("scope", &self.scope)?;
        Ok(())
    }
}

/// Everything one merge run needs, fixed at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeConfig {
    pub namespace: NamespaceConfig,
    /// Shard whose counters are folded in.
    pub source_id: u32,
    /// Shard that receives the sums.
    pub dest_id: u32,
    pub scan_count: usize,
    /// Compute every record without writing.
    pub dry_run: bool,
}

impl MergeConfig {
    pub fn new(namespace: NamespaceConfig, source_id: u32, dest_id: u32) -> Self {
        Self {
            namespace,
            source_id,
            dest_id,
            scan_count: StoreConfig::default().scan_count,
            dry_run: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.namespace.validate()?;
        if self.source_id == self.dest_id {
            return Err(ConfigError::SameShard(self.source_id));
        }
        if self.scan_count == 0 {
            return Err(ConfigError::ZeroScanCount);
        }
        Ok(())
    }
}

/// Shard pair stored in the config file. Either side may be given on the
/// command line instead.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_id: Option<u32>,
}

/// Contents of `cmerge.toml`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub namespace: NamespaceConfig,
    pub merge: MergeSection,
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Copy of this config with the password masked, for display.
    pub fn redacted(&self) -> Self {
        Self {
            store: self.store.redacted(),
            ..self.clone()
        }
    }

    /// TOML rendering with the password masked.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(&self.redacted()).map_err(|e| ConfigError::Render(e.to_string()))
    }
}
