//! Configuration management for tether.
//!
//! Configuration is read-only after start: it is derived from the embedded
//! defaults (optionally overridden from `~/.tether/config.yaml`) and never
//! persisted by the engine.

mod paths;
mod settings;

pub use paths::Paths;
pub use settings::{
    CacheConfig, CacheKind, Config, ConflictConfig, Feature, FeatureFlags, PriorityLevel,
    PriorityWeights, RetryPolicy, SecurityConfig, SyncConfig, REQUIRED_SECTIONS,
};
