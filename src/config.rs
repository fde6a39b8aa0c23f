//! Environment-driven configuration.
//!
//! Every knob has a documented default and is read as a plain key/value with
//! type coercion only — an unparseable value falls back to the default
//! rather than aborting startup.

use std::env;

use crate::model::ThresholdConfig;

/// Default base address of the analysis service / alert store.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Default location label attached to a report when the caller supplies none.
pub const DEFAULT_LOCATION: &str = "Kandavli";

/// Runtime configuration for the orchestration layer.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the external service (no trailing slash).
    pub base_url: String,

    /// Fallback location label for analysis requests.
    pub default_location: String,

    /// Default thresholds and sampling interval for analysis requests.
    pub thresholds: ThresholdConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            default_location: DEFAULT_LOCATION.to_string(),
            thresholds: ThresholdConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Recognized variables:
    ///
    /// - `CROWDWATCH_BASE_URL` (default `http://127.0.0.1:8000`)
    /// - `CROWDWATCH_DEFAULT_LOCATION` (default `Kandavli`)
    /// - `CROWDWATCH_THRESHOLD_LOW` / `_MEDIUM` / `_HIGH`
    ///   (defaults 0.0008 / 0.0012 / 0.0016)
    /// - `CROWDWATCH_SAMPLE_EVERY_SECONDS` (default 0.2)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary lookup function.
    ///
    /// `from_env` is a thin wrapper over this; tests inject a map instead of
    /// mutating process-wide environment state.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ThresholdConfig::default();

        let base_url = lookup("CROWDWATCH_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let default_location =
            lookup("CROWDWATCH_DEFAULT_LOCATION").unwrap_or_else(|| DEFAULT_LOCATION.to_string());

        let thresholds = ThresholdConfig {
            low: parse_f64(&lookup, "CROWDWATCH_THRESHOLD_LOW", defaults.low),
            medium: parse_f64(&lookup, "CROWDWATCH_THRESHOLD_MEDIUM", defaults.medium),
            high: parse_f64(&lookup, "CROWDWATCH_THRESHOLD_HIGH", defaults.high),
            sample_every_seconds: parse_f64(
                &lookup,
                "CROWDWATCH_SAMPLE_EVERY_SECONDS",
                defaults.sample_every_seconds,
            ),
        };

        Self {
            base_url,
            default_location,
            thresholds,
        }
    }
}

fn parse_f64<F>(lookup: &F, key: &str, default: f64) -> f64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}
