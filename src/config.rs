//! Engine configuration.
//!
//! Every field has a default taken from the Mesh Model profile, so an
//! empty JSON object is a complete configuration:
//!
//! ```rust
//! use meshstate::config::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{ "scene_slots": 4 }"#).unwrap();
//! assert_eq!(config.scene_slots, 4);
//! assert_eq!(config.dedup_timeout_ms, 6_000);
//! ```

use crate::bindings::MAX_BINDINGS;
use crate::core::DEFAULT_HISTORY_LIMIT;
use crate::dedup::TRANSACTION_TIMEOUT_MS;
use serde::{Deserialize, Serialize};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// Default number of scene slots per scene-capable model.
pub const DEFAULT_SCENE_SLOTS: usize = 16;

/// Default interval between interim steps of a long transition.
pub const DEFAULT_STEP_INTERVAL_MS: u32 = 1_000;

/// Default update interval of a Level Move.
pub const DEFAULT_MOVE_INTERVAL_MS: u32 = 100;

/// Default limit on nested binding resolution.
pub const DEFAULT_MAX_BIND_DEPTH: usize = 2;

/// Problems found in a configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("binding capacity {0} exceeds the maximum of {MAX_BINDINGS}")]
    BindingCapacity(usize),

    #[error("transaction timeout must be greater than zero")]
    ZeroTransactionTimeout,

    #[error("step interval must be greater than zero")]
    ZeroStepInterval,

    #[error("move interval must be greater than zero")]
    ZeroMoveInterval,

    #[error("bind depth must be at least 1")]
    ZeroBindDepth,

    #[error("configuration could not be parsed: {0}")]
    Parse(String),

    #[error("configuration is invalid: {0:?}")]
    Invalid(Vec<ConfigError>),
}

/// Tunables of an [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of registered bindings
    pub binding_capacity: usize,
    /// Lifetime of a remembered transaction
    pub dedup_timeout_ms: u32,
    /// Scene slots per scene-capable model
    pub scene_slots: usize,
    /// Interim step interval of long numeric transitions
    pub step_interval_ms: u32,
    /// Update interval of a Level Move
    pub move_interval_ms: u32,
    /// Nesting limit of binding resolution
    pub max_bind_depth: usize,
    /// State changes kept per descriptor
    pub history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binding_capacity: MAX_BINDINGS,
            dedup_timeout_ms: TRANSACTION_TIMEOUT_MS,
            scene_slots: DEFAULT_SCENE_SLOTS,
            step_interval_ms: DEFAULT_STEP_INTERVAL_MS,
            move_interval_ms: DEFAULT_MOVE_INTERVAL_MS,
            max_bind_depth: DEFAULT_MAX_BIND_DEPTH,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

fn check(ok: bool, error: ConfigError) -> Validation<(), NonEmptyVec<ConfigError>> {
    if ok {
        Validation::success(())
    } else {
        Validation::fail(error)
    }
}

impl EngineConfig {
    /// Check every field, accumulating all problems.
    pub fn validate(&self) -> Validation<(), NonEmptyVec<ConfigError>> {
        let checks = vec![
            check(
                self.binding_capacity <= MAX_BINDINGS,
                ConfigError::BindingCapacity(self.binding_capacity),
            ),
            check(self.dedup_timeout_ms > 0, ConfigError::ZeroTransactionTimeout),
            check(self.step_interval_ms > 0, ConfigError::ZeroStepInterval),
            check(self.move_interval_ms > 0, ConfigError::ZeroMoveInterval),
            check(self.max_bind_depth > 0, ConfigError::ZeroBindDepth),
        ];

        Validation::all_vec(checks).map(|_| ())
    }

    /// Validate, collecting every problem into one error.
    pub fn checked(self) -> Result<Self, ConfigError> {
        match self.validate() {
            Validation::Success(_) => Ok(self),
            Validation::Failure(errors) => Err(ConfigError::Invalid(errors.iter().cloned().collect())),
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.checked()
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(matches!(
            EngineConfig::default().validate(),
            Validation::Success(_)
        ));
    }

    #[test]
    fn validation_accumulates_all_problems() {
        let config = EngineConfig {
            binding_capacity: 64,
            dedup_timeout_ms: 0,
            max_bind_depth: 0,
            ..EngineConfig::default()
        };

        match config.validate() {
            Validation::Failure(errors) => {
                assert_eq!(errors.len(), 3);
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, ConfigError::BindingCapacity(64))));
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, ConfigError::ZeroTransactionTimeout)));
                assert!(errors.iter().any(|e| matches!(e, ConfigError::ZeroBindDepth)));
            }
            Validation::Success(_) => panic!("Expected failures, got success"),
        }
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = EngineConfig::from_json(r#"{ "binding_capacity": 8 }"#).unwrap();
        assert_eq!(config.binding_capacity, 8);
        assert_eq!(config.step_interval_ms, DEFAULT_STEP_INTERVAL_MS);
    }

    #[test]
    fn invalid_json_config_is_rejected() {
        let result = EngineConfig::from_json(r#"{ "step_interval_ms": 0 }"#);
        assert_eq!(
            result,
            Err(ConfigError::Invalid(vec![ConfigError::ZeroStepInterval]))
        );
        assert!(matches!(
            EngineConfig::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = EngineConfig {
            scene_slots: 2,
            ..EngineConfig::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }
}
