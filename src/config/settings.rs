//! Configuration settings for tether.
//!
//! The configuration is embedded in the binary (`default.yaml`) and parsed
//! once at process start. A user override can be placed at
//! `~/.tether/config.yaml`. Loading never fails: anything that does not
//! parse or validate is replaced by the hardcoded defaults and logged.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Paths;
use crate::error::TetherError;

/// Configuration text compiled into the binary.
const EMBEDDED_CONFIG: &str = include_str!("default.yaml");

/// Top-level sections every configuration document must define.
pub const REQUIRED_SECTIONS: [&str; 6] = ["features", "cache", "retry", "sync", "conflict", "security"];

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Feature flags.
    pub features: FeatureFlags,
    /// Cache lifetimes.
    pub cache: CacheConfig,
    /// Retry policy for failed operations.
    pub retry: RetryPolicy,
    /// Sync scheduling settings.
    pub sync: SyncConfig,
    /// Conflict resolution settings.
    pub conflict: ConflictConfig,
    /// At-rest storage settings.
    pub security: SecurityConfig,
}

/// Feature flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeatureFlags {
    /// Register the recurring background sync task.
    #[serde(default = "default_true")]
    pub background_sync: bool,
    /// Apply conflict strategies; when off every conflict resolves to the server copy.
    #[serde(default = "default_true")]
    pub conflict_resolution: bool,
    /// Obfuscate sensitive keys at rest.
    #[serde(default = "default_true")]
    pub encryption: bool,
    /// Accept mutations into the operation queue; when off, enqueue is refused.
    #[serde(default = "default_true")]
    pub offline_mode: bool,
}

/// A named feature flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    BackgroundSync,
    ConflictResolution,
    Encryption,
    OfflineMode,
}

/// Cache lifetimes, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_secs: u64,
    #[serde(default = "default_incidents_ttl")]
    pub incidents_ttl_secs: u64,
    #[serde(default = "default_assignments_ttl")]
    pub assignments_ttl_secs: u64,
    #[serde(default = "default_profile_ttl")]
    pub profile_ttl_secs: u64,
}

/// Kinds of cached data with their own lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Default,
    Incidents,
    Assignments,
    Profile,
}

/// Retry policy for failed operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts before an operation is excluded from automatic retry.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, also the per-pass debounce window.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound for the computed delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Growth factor per attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

/// Sync scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Priority weight per level.
    pub priorities: PriorityWeights,
    /// Interval of the recurring background task.
    #[serde(default = "default_background_interval")]
    pub background_interval_secs: u64,
    /// How often hosts should poll connectivity.
    #[serde(default = "default_network_polling_interval")]
    pub network_polling_interval_ms: u64,
    /// Upper bound for one executor call.
    #[serde(default = "default_execution_timeout")]
    pub execution_timeout_ms: u64,
}

/// Priority weights; higher runs first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PriorityWeights {
    #[serde(default = "default_critical")]
    pub critical: u32,
    #[serde(default = "default_high")]
    pub high: u32,
    #[serde(default = "default_medium")]
    pub medium: u32,
    #[serde(default = "default_low")]
    pub low: u32,
}

/// Priority bands an operation type can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    Critical,
    High,
    Medium,
    Low,
}

/// Conflict resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConflictConfig {
    /// Strategy name used when callers do not pick one.
    #[serde(default = "default_strategy")]
    pub default_strategy: String,
}

/// At-rest storage settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Keys whose values are encoded before they reach the backend.
    #[serde(default = "default_sensitive_keys")]
    pub sensitive_keys: Vec<String>,
    /// Seed for the at-rest encoding.
    #[serde(default = "default_key_material")]
    pub key_material: String,
}

// Default value functions for serde
const fn default_true() -> bool {
    true
}

const fn default_cache_ttl() -> u64 {
    300
}

const fn default_incidents_ttl() -> u64 {
    60
}

const fn default_assignments_ttl() -> u64 {
    120
}

const fn default_profile_ttl() -> u64 {
    3600
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_delay_ms() -> u64 {
    1000
}

const fn default_max_delay_ms() -> u64 {
    30_000
}

const fn default_backoff_multiplier() -> f64 {
    2.0
}

const fn default_background_interval() -> u64 {
    900 // 15 minutes
}

const fn default_network_polling_interval() -> u64 {
    30_000
}

const fn default_execution_timeout() -> u64 {
    30_000
}

const fn default_critical() -> u32 {
    100
}

const fn default_high() -> u32 {
    75
}

const fn default_medium() -> u32 {
    50
}

const fn default_low() -> u32 {
    25
}

fn default_strategy() -> String {
    "server-wins".to_string()
}

fn default_sensitive_keys() -> Vec<String> {
    ["auth_token", "refresh_token", "user_credentials", "user_profile", "device_key"]
        .iter()
        .map(|k| (*k).to_string())
        .collect()
}

fn default_key_material() -> String {
    "tether-local-obfuscation".to_string()
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            background_sync: default_true(),
            conflict_resolution: default_true(),
            encryption: default_true(),
            offline_mode: default_true(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_cache_ttl(),
            incidents_ttl_secs: default_incidents_ttl(),
            assignments_ttl_secs: default_assignments_ttl(),
            profile_ttl_secs: default_profile_ttl(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            priorities: PriorityWeights::default(),
            background_interval_secs: default_background_interval(),
            network_polling_interval_ms: default_network_polling_interval(),
            execution_timeout_ms: default_execution_timeout(),
        }
    }
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            critical: default_critical(),
            high: default_high(),
            medium: default_medium(),
            low: default_low(),
        }
    }
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            default_strategy: default_strategy(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            sensitive_keys: default_sensitive_keys(),
            key_material: default_key_material(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based), capped at `max_delay_ms`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

impl Config {
    /// Load the embedded configuration.
    ///
    /// Falls back to [`Config::default`] if the embedded document does not
    /// parse or is missing a required section.
    #[must_use]
    pub fn load() -> Self {
        Self::load_from_str(EMBEDDED_CONFIG)
    }

    /// Load configuration from YAML text, falling back to defaults on failure.
    #[must_use]
    pub fn load_from_str(yaml: &str) -> Self {
        match Self::parse(yaml) {
            Ok(config) => config,
            Err(e) => {
                warn!("Invalid configuration, using built-in defaults: {e}");
                Self::default()
            },
        }
    }

    /// Load configuration from a file.
    ///
    /// A missing or unreadable file yields the embedded configuration; an
    /// invalid one yields the built-in defaults.
    #[must_use]
    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            debug!("No config override at {}, using embedded config", path.display());
            return Self::load();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::load_from_str(&contents),
            Err(e) => {
                warn!("Failed to read config file {}: {e}", path.display());
                Self::load()
            },
        }
    }

    /// Load the user override if present, otherwise the embedded config.
    #[must_use]
    pub fn load_default_location() -> Self {
        Self::load_from_path(&Paths::default().config_file)
    }

    /// Parse and validate YAML text without any fallback.
    ///
    /// # Errors
    ///
    /// Returns `TetherError::Config` if the text does not parse, a required
    /// section is missing, or a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, TetherError> {
        let document: serde_yaml::Value = serde_yaml::from_str(yaml)
            .map_err(|e| TetherError::Config(format!("Failed to parse config: {e}")))?;

        let mapping = document
            .as_mapping()
            .ok_or_else(|| TetherError::Config("Config root must be a mapping".to_string()))?;

        for section in REQUIRED_SECTIONS {
            if !mapping.contains_key(section) {
                return Err(TetherError::Config(format!("Missing config section: {section}")));
            }
        }

        let config: Self = serde_yaml::from_value(document)
            .map_err(|e| TetherError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), TetherError> {
        if self.retry.max_attempts == 0 {
            return Err(TetherError::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(TetherError::Config(
                "retry.backoff_multiplier must be a finite number >= 1.0".to_string(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(TetherError::Config(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".to_string(),
            ));
        }
        if self.sync.background_interval_secs == 0 {
            return Err(TetherError::Config(
                "sync.background_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Get a named top-level section as a YAML value.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<serde_yaml::Value> {
        let document = serde_yaml::to_value(self).ok()?;
        document.get(name).cloned()
    }

    /// Check a feature flag.
    #[must_use]
    pub const fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::BackgroundSync => self.features.background_sync,
            Feature::ConflictResolution => self.features.conflict_resolution,
            Feature::Encryption => self.features.encryption,
            Feature::OfflineMode => self.features.offline_mode,
        }
    }

    /// Backoff delay before retry number `attempt`.
    #[must_use]
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry.delay(attempt)
    }

    /// Debounce window for operations that failed recently.
    #[must_use]
    pub const fn base_retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry.base_delay_ms)
    }

    /// Weight for a priority level.
    #[must_use]
    pub const fn priority_weight(&self, level: PriorityLevel) -> u32 {
        let weights = &self.sync.priorities;
        match level {
            PriorityLevel::Critical => weights.critical,
            PriorityLevel::High => weights.high,
            PriorityLevel::Medium => weights.medium,
            PriorityLevel::Low => weights.low,
        }
    }

    /// Lifetime for a kind of cached data.
    #[must_use]
    pub const fn cache_ttl(&self, kind: CacheKind) -> Duration {
        let secs = match kind {
            CacheKind::Default => self.cache.default_ttl_secs,
            CacheKind::Incidents => self.cache.incidents_ttl_secs,
            CacheKind::Assignments => self.cache.assignments_ttl_secs,
            CacheKind::Profile => self.cache.profile_ttl_secs,
        };
        Duration::from_secs(secs)
    }

    #[must_use]
    pub const fn background_interval(&self) -> Duration {
        Duration::from_secs(self.sync.background_interval_secs)
    }

    #[must_use]
    pub const fn network_polling_interval(&self) -> Duration {
        Duration::from_millis(self.sync.network_polling_interval_ms)
    }

    #[must_use]
    pub const fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.sync.execution_timeout_ms)
    }

    /// Whether `key` is designated for at-rest obfuscation.
    #[must_use]
    pub fn is_sensitive_key(&self, key: &str) -> bool {
        self.security.sensitive_keys.iter().any(|k| k == key)
    }
}
