//! Core configuration for vizij-timeline-core.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::interp::Easing;

/// Environment variable consulted by [`Config::from_env`].
pub const MODE_ENV_VAR: &str = "VIZIJ_ENV";

/// Build mode. Authoring (hydration, model flushes) is only permitted in development.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    Production,
}

impl Mode {
    #[inline]
    pub fn is_development(self) -> bool {
        matches!(self, Mode::Development)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Development => f.write_str("development"),
            Mode::Production => f.write_str("production"),
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Mode::Development),
            "production" | "prod" => Ok(Mode::Production),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }
}

/// Engine configuration: mode, evaluation options and buffer sizing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub mode: Mode,

    /// Progress refinement applied between keyframes.
    pub easing: Easing,

    /// Authoring inputs are truncated to this many decimals. `None` keeps full precision.
    pub value_precision: Option<u32>,

    /// Upper bound for a single frame delta; protects against long stalls (tab switches etc.).
    pub max_frame_delta_ms: f64,

    /// Number of diagnostics retained in memory before the oldest are dropped.
    pub max_diagnostics: usize,

    pub default_spline_tension: f64,

    /// Initial capacity hint for the per-pass write buffer.
    pub scratch_writes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Development,
            easing: Easing::Handles,
            value_precision: Some(3),
            max_frame_delta_ms: 1000.0,
            max_diagnostics: 256,
            default_spline_tension: 0.5,
            scratch_writes: 256,
        }
    }
}

impl Config {
    pub fn development() -> Self {
        Self::default()
    }

    pub fn production() -> Self {
        Self {
            mode: Mode::Production,
            ..Self::default()
        }
    }

    /// Reads the mode from `VIZIJ_ENV`. A missing or unknown value is fatal for engine
    /// construction.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = lookup(MODE_ENV_VAR).ok_or(ConfigError::MissingMode {
            var: MODE_ENV_VAR,
        })?;
        let mode = raw.parse::<Mode>()?;
        Ok(Self {
            mode,
            ..Self::default()
        })
    }
}
