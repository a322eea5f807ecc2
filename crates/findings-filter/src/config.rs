//! Reconciler configuration
//!
//! Serde-friendly settings with defaults, loadable from the environment.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::ValidationError;

/// Settings of the delete-confirmation loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    /// Maximum number of confirmation reads.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first read that still finds the filter.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound on the delay between reads.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Factor applied to the delay after each read.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl ConfirmationConfig {
    /// Set the attempt bound.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the initial and maximum delays. Delays past `u64::MAX`
    /// milliseconds saturate.
    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay_ms = u64::try_from(initial.as_millis()).unwrap_or(u64::MAX);
        self.max_delay_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Get the initial delay as Duration.
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Get the maximum delay as Duration.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Check that the loop is bounded and the backoff never shrinks.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |message: &str| {
            Err(ValidationError::InvalidConfig {
                message: message.to_string(),
            })
        };

        if self.max_attempts == 0 {
            return invalid("confirmation max_attempts must be at least 1");
        }
        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
            return invalid("confirmation backoff_multiplier must be >= 1.0");
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return invalid("confirmation max_delay_ms must be >= initial_delay_ms");
        }
        Ok(())
    }
}

/// Configuration of a [`crate::engine::FilterReconciler`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    /// Tag key prefixes owned by the remote platform; never unset, never
    /// imported.
    #[serde(default = "default_ignored_tag_prefixes")]
    pub ignored_tag_prefixes: Vec<String>,
}

fn default_ignored_tag_prefixes() -> Vec<String> {
    vec!["aws:".to_string()]
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            confirmation: ConfirmationConfig::default(),
            ignored_tag_prefixes: default_ignored_tag_prefixes(),
        }
    }
}

impl ReconcilerConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the confirmation settings.
    pub fn with_confirmation(mut self, confirmation: ConfirmationConfig) -> Self {
        self.confirmation = confirmation;
        self
    }

    /// Parse configuration from environment variables.
    ///
    /// Reads:
    /// - `FINDINGS_FILTER_DELETE_MAX_ATTEMPTS` (default: 10)
    /// - `FINDINGS_FILTER_DELETE_INITIAL_DELAY_MS` (default: 500)
    /// - `FINDINGS_FILTER_DELETE_MAX_DELAY_MS` (default: 10000)
    /// - `FINDINGS_FILTER_IGNORED_TAG_PREFIXES`, comma-separated (default: "aws:")
    ///
    /// Unparseable numbers fall back to their defaults; the result is
    /// validated.
    pub fn from_env() -> Result<Self, ValidationError> {
        fn parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
            env::var(name)
                .ok()
                .and_then(|s| s.trim().parse::<T>().ok())
                .unwrap_or(default)
        }

        let confirmation = ConfirmationConfig {
            max_attempts: parsed("FINDINGS_FILTER_DELETE_MAX_ATTEMPTS", default_max_attempts()),
            initial_delay_ms: parsed(
                "FINDINGS_FILTER_DELETE_INITIAL_DELAY_MS",
                default_initial_delay_ms(),
            ),
            max_delay_ms: parsed("FINDINGS_FILTER_DELETE_MAX_DELAY_MS", default_max_delay_ms()),
            backoff_multiplier: default_backoff_multiplier(),
        };

        let ignored_tag_prefixes = match env::var("FINDINGS_FILTER_IGNORED_TAG_PREFIXES") {
            Ok(s) => s
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect(),
            Err(_) => default_ignored_tag_prefixes(),
        };

        let config = Self {
            confirmation,
            ignored_tag_prefixes,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.confirmation.validate()
    }
}
