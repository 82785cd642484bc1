use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Sharding parameters for tree construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Maximum number of direct entries a tree node holds before it is split
    /// into buckets.
    pub fan_out_threshold: usize,
    /// Number of buckets a sharded node partitions its entries into.
    pub bucket_count: u32,
    /// Depth at which sharding stops; deeper nodes keep all their entries.
    pub max_depth: usize,
    /// When to store trees as deltas against a previous version.
    pub delta: DeltaConfig,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            fan_out_threshold: 512,
            bucket_count: 32,
            max_depth: 20,
            delta: DeltaConfig::default(),
        }
    }
}

impl TreeConfig {
    /// Configuration with the given fan-out threshold and defaults otherwise.
    pub fn with_fan_out(fan_out_threshold: usize) -> Self {
        Self {
            fan_out_threshold,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.fan_out_threshold == 0 {
            return Err(StoreError::Config("fan_out_threshold must be > 0".into()));
        }
        if self.bucket_count < 2 || self.bucket_count > 256 {
            return Err(StoreError::Config(format!(
                "bucket_count must be in 2..=256, got {}",
                self.bucket_count
            )));
        }
        self.delta.validate()
    }
}

/// Delta-encoding thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeltaConfig {
    /// Longest allowed chain of delta trees. `0` disables delta encoding.
    pub max_level: u32,
    /// Minimum fraction of entries that must be reused from the original tree
    /// for a delta encoding to be produced.
    pub min_reuse_ratio: f64,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            max_level: 4,
            min_reuse_ratio: 0.5,
        }
    }
}

impl DeltaConfig {
    pub fn disabled() -> Self {
        Self {
            max_level: 0,
            ..Default::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_level > 0
    }

    pub fn validate(&self) -> StoreResult<()> {
        if !(0.0..=1.0).contains(&self.min_reuse_ratio) {
            return Err(StoreError::Config(format!(
                "min_reuse_ratio must be in [0, 1], got {}",
                self.min_reuse_ratio
            )));
        }
        Ok(())
    }
}

/// Backend-independent store settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub read_only: bool,
    pub tree: TreeConfig,
}

impl StoreConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))?;
        config.tree.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> StoreResult<String> {
        toml::to_string(self).map_err(|e| StoreError::Config(e.to_string()))
    }
}

/// Settings for [`StorePool`](crate::pool::StorePool).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of open stores held by the pool.
    pub max_size: usize,
    /// How long a released store may sit unused before it is closed.
    pub idle_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 16,
            idle_timeout_ms: 60_000,
        }
    }
}

impl PoolConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = StoreConfig::default();
        assert!(!c.read_only);
        assert_eq!(c.tree.fan_out_threshold, 512);
        assert_eq!(c.tree.bucket_count, 32);
        assert_eq!(c.tree.delta.max_level, 4);
        assert!(c.tree.validate().is_ok());
        assert_eq!(PoolConfig::default().idle_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn parse_partial_toml() {
        let c = StoreConfig::from_toml_str(
            r#"
            read_only = true

            [tree]
            fan_out_threshold = 2000

            [tree.delta]
            max_level = 0
            "#,
        )
        .unwrap();
        assert!(c.read_only);
        assert_eq!(c.tree.fan_out_threshold, 2000);
        assert_eq!(c.tree.bucket_count, 32);
        assert!(!c.tree.delta.is_enabled());
    }

    #[test]
    fn toml_roundtrip() {
        let c = StoreConfig {
            read_only: false,
            tree: TreeConfig::with_fan_out(64),
        };
        let s = c.to_toml_string().unwrap();
        assert_eq!(StoreConfig::from_toml_str(&s).unwrap(), c);
    }

    #[test]
    fn rejects_bad_bucket_count() {
        let err = StoreConfig::from_toml_str("[tree]\nbucket_count = 1").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
        let err = StoreConfig::from_toml_str("[tree]\nbucket_count = 300").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn rejects_zero_fan_out_and_bad_ratio() {
        assert!(TreeConfig::with_fan_out(0).validate().is_err());
        let mut c = TreeConfig::default();
        c.delta.min_reuse_ratio = 1.5;
        assert!(c.validate().is_err());
    }
}
