//! Error taxonomy for crowdwatch.
//!
//! One error type per orchestration activity. All remote-call failures are
//! caught at the component boundary and surfaced as one of these; nothing in
//! this crate panics across component boundaries. A failure in one activity
//! never interrupts the others — a failed alert poll does not stop the
//! location watch, and vice versa.

use thiserror::Error;

/// Invalid analysis parameters, rejected before any network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The ascending-threshold invariant does not hold (NaN also lands here).
    #[error("thresholds must satisfy low < medium < high (got {low}, {medium}, {high})")]
    ThresholdOrder {
        /// Configured LOW cutoff.
        low: f64,
        /// Configured MEDIUM cutoff.
        medium: f64,
        /// Configured HIGH cutoff.
        high: f64,
    },

    /// The sampling interval must be strictly positive.
    #[error("sampling interval must be positive (got {0})")]
    NonPositiveInterval(f64),

    /// The request carried no media bytes.
    #[error("media must not be empty")]
    EmptyMedia,
}

/// The remote analysis call failed or returned unusable data.
///
/// No retry at this layer; the caller decides whether to resubmit.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Pre-flight validation failed; no request was issued.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Transport-level failure (connect, timeout, body read).
    #[error("analysis request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("analysis failed: {0}")]
    Status(String),

    /// The response body did not match the expected report shape.
    #[error("analysis response could not be decoded: {0}")]
    Decode(String),
}

/// An alert or location poll failed. Non-fatal: the previous local view is
/// retained and the polling cadence continues.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure.
    #[error("fetch failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("fetch failed: {0}")]
    Status(String),

    /// The response body did not match the expected shape.
    #[error("fetch response could not be decoded: {0}")]
    Decode(String),
}

/// An acknowledge call failed or was rejected; the alert stays NEW in the
/// local view until a later refresh shows otherwise.
#[derive(Debug, Error)]
pub enum AckError {
    /// An acknowledge for the same alert is already outstanding; no
    /// external call was made.
    #[error("acknowledge already in flight for alert {0}")]
    InFlight(String),

    /// Transport-level failure.
    #[error("acknowledge request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The store answered with a non-success status (message is the server
    /// body when present).
    #[error("acknowledge failed: {0}")]
    Status(String),

    /// The response body did not decode as an alert record.
    #[error("acknowledge response could not be decoded: {0}")]
    Decode(String),
}

/// A location-sharing failure. Permission and watch failures move the
/// session into its Error state; publish failures are recorded while the
/// session stays Active.
#[derive(Debug, Error, Clone)]
pub enum LocationError {
    /// The user or platform denied geolocation permission.
    #[error("geolocation permission denied")]
    PermissionDenied,

    /// The platform has no position provider available.
    #[error("geolocation is not available: {0}")]
    Unavailable(String),

    /// The running position watch failed irrecoverably.
    #[error("position watch failed: {0}")]
    WatchFailed(String),

    /// Pushing a fix (or the final stop) to the store failed.
    #[error("location publish failed: {0}")]
    Publish(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_message_names_thresholds() {
        let err = ConfigError::ThresholdOrder {
            low: 0.2,
            medium: 0.1,
            high: 0.3,
        };
        let msg = err.to_string();
        assert!(msg.contains("low < medium < high"));
        assert!(msg.contains("0.2"));
    }

    #[test]
    fn test_analysis_error_wraps_config_error_transparently() {
        let err: AnalysisError = ConfigError::EmptyMedia.into();
        assert_eq!(err.to_string(), "media must not be empty");
    }

    #[test]
    fn test_in_flight_names_the_alert() {
        let err = AckError::InFlight("abc-123".to_string());
        assert!(err.to_string().contains("abc-123"));
    }
}
