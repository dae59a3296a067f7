//! Process-wide naming configuration.
//!
//! The prefix and suffix are read every time an index name is resolved.
//! Replace them at startup, before operations are in flight: a replacement is
//! never observed half-applied, but operations already running may resolve
//! names with either the old or the new pair.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::env;

/// Environment variable holding the index name prefix.
pub const PREFIX_ENV: &str = "ELSEARM_INDEX_PREFIX";

/// Environment variable holding the index name suffix.
pub const SUFFIX_ENV: &str = "ELSEARM_INDEX_SUFFIX";

static GLOBAL_CONFIG: Lazy<RwLock<NamingConfig>> =
    Lazy::new(|| RwLock::new(NamingConfig::default()));

/// Index naming configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamingConfig {
    /// Prepended to every resolved index name.
    pub index_name_prefix: String,
    /// Appended to every resolved index name.
    pub index_name_suffix: String,
}

impl NamingConfig {
    /// Create a configuration with the given prefix and suffix.
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            index_name_prefix: prefix.into(),
            index_name_suffix: suffix.into(),
        }
    }

    /// Set the prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.index_name_prefix = prefix.into();
        self
    }

    /// Set the suffix.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.index_name_suffix = suffix.into();
        self
    }

    /// Read `ELSEARM_INDEX_PREFIX` and `ELSEARM_INDEX_SUFFIX`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            index_name_prefix: lookup(PREFIX_ENV).unwrap_or_default(),
            index_name_suffix: lookup(SUFFIX_ENV).unwrap_or_default(),
        }
    }

    /// Whether neither a prefix nor a suffix is configured.
    pub fn is_empty(&self) -> bool {
        self.index_name_prefix.is_empty() && self.index_name_suffix.is_empty()
    }
}

/// Replace the global naming configuration.
pub fn set_global_config(config: NamingConfig) {
    tracing::debug!(
        "Index naming set to prefix={:?} suffix={:?}",
        config.index_name_prefix,
        config.index_name_suffix
    );
    *GLOBAL_CONFIG.write() = config;
}

/// Snapshot of the global naming configuration.
pub fn global_config() -> NamingConfig {
    GLOBAL_CONFIG.read().clone()
}
