//! Configuration types
//!
//! Every field has a default so an empty TOML document is a valid
//! configuration. Environment variables are applied on top of whatever was
//! loaded from file.

use crate::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// Default capacity of the in-memory cache store.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;

/// Which interceptors a standard pipeline is assembled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Reject tenant-required requests when no tenant is active.
    pub enforcement: bool,
    /// Reject requests bound to a tenant other than the active one.
    pub validation: bool,
    /// Serve cacheable requests from the tenant-scoped cache.
    pub caching: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enforcement: true,
            validation: true,
            caching: true,
        }
    }
}

/// Settings for the in-memory cache store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Maximum number of live entries before the oldest is evicted.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
        }
    }
}

impl CacheConfig {
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }
}

/// Top-level tenantry configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TenancyConfig {
    pub pipeline: PipelineConfig,
    pub cache: CacheConfig,
}

impl TenancyConfig {
    /// Load from a TOML file, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_path(path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Overlay values from process environment variables.
    ///
    /// - `TENANTRY_ENFORCEMENT`: "true" or "false"
    /// - `TENANTRY_VALIDATION`: "true" or "false"
    /// - `TENANTRY_CACHING`: "true" or "false"
    /// - `TENANTRY_CACHE_MAX_ENTRIES`: positive integer
    ///
    /// Unparsable values leave the current setting untouched.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Same as [`apply_env`](Self::apply_env) with a custom variable source.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| {
            lookup(key).and_then(|s| match s.trim().to_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            })
        };

        if let Some(v) = flag("TENANTRY_ENFORCEMENT") {
            self.pipeline.enforcement = v;
        }
        if let Some(v) = flag("TENANTRY_VALIDATION") {
            self.pipeline.validation = v;
        }
        if let Some(v) = flag("TENANTRY_CACHING") {
            self.pipeline.caching = v;
        }
        if let Some(v) = lookup("TENANTRY_CACHE_MAX_ENTRIES").and_then(|s| s.trim().parse().ok()) {
            self.cache.max_entries = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.max_entries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.max_entries",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}
