//! Data models for crowdwatch.
//!
//! These types mirror the wire formats of the external services this crate
//! orchestrates: the analysis service and the alert/location store. Two
//! casing conventions coexist on purpose — analysis and location payloads
//! are camelCase, alert records are snake_case — because the store persists
//! alerts in snake_case while the analysis API speaks camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default LOW reconstruction-loss threshold.
pub const DEFAULT_THRESHOLD_LOW: f64 = 0.0008;

/// Default MEDIUM reconstruction-loss threshold.
pub const DEFAULT_THRESHOLD_MEDIUM: f64 = 0.0012;

/// Default HIGH reconstruction-loss threshold.
pub const DEFAULT_THRESHOLD_HIGH: f64 = 0.0016;

/// Default sampling interval in seconds (~5 samples per second of video).
pub const DEFAULT_SAMPLE_EVERY_SECONDS: f64 = 0.2;

/// Ascending loss cutoffs plus the sampling interval for one analysis request.
///
/// Immutable once a request is issued. Callers must run
/// [`ThresholdConfig::validate`] before use; the classifier itself assumes a
/// well-formed config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Loss at or above this value classifies as at least LOW.
    pub low: f64,

    /// Loss at or above this value classifies as at least MEDIUM.
    pub medium: f64,

    /// Loss at or above this value classifies as HIGH.
    pub high: f64,

    /// Seconds of media covered by one analysis window.
    pub sample_every_seconds: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            low: DEFAULT_THRESHOLD_LOW,
            medium: DEFAULT_THRESHOLD_MEDIUM,
            high: DEFAULT_THRESHOLD_HIGH,
            sample_every_seconds: DEFAULT_SAMPLE_EVERY_SECONDS,
        }
    }
}

impl ThresholdConfig {
    /// Check the ordering invariant (`low < medium < high`, interval > 0).
    ///
    /// NaN thresholds fail the ordering comparison and are rejected the same
    /// way as a mis-ordered config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.low < self.medium && self.medium < self.high) {
            return Err(ConfigError::ThresholdOrder {
                low: self.low,
                medium: self.medium,
                high: self.high,
            });
        }
        if !(self.sample_every_seconds > 0.0) {
            return Err(ConfigError::NonPositiveInterval(self.sample_every_seconds));
        }
        Ok(())
    }
}

/// Ordinal severity derived from reconstruction loss vs. thresholds.
///
/// Ordering is `NONE < LOW < MEDIUM < HIGH`; the derived `Ord` relies on the
/// variant declaration order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Loss below every threshold; normal scene motion.
    #[default]
    None,

    /// Loss at or above the LOW cutoff.
    Low,

    /// Loss at or above the MEDIUM cutoff. Raises an alert server-side.
    Medium,

    /// Loss at or above the HIGH cutoff. Raises an alert server-side.
    High,
}

impl RiskLevel {
    /// Classify one reconstruction-loss value against the thresholds.
    ///
    /// Boundaries are inclusive on the lower edge of each tier: a loss
    /// exactly equal to a cutoff classifies into the tier that cutoff opens.
    ///
    /// Pure and total. An invalid config (e.g. `low >= medium`) is a caller
    /// error, not a runtime failure here — validate before classifying.
    pub fn classify(loss: f64, cfg: &ThresholdConfig) -> Self {
        if loss >= cfg.high {
            RiskLevel::High
        } else if loss >= cfg.medium {
            RiskLevel::Medium
        } else if loss >= cfg.low {
            RiskLevel::Low
        } else {
            RiskLevel::None
        }
    }

    /// Fixed human-readable cause string for this severity. Deterministic.
    pub fn cause(&self) -> &'static str {
        match self {
            RiskLevel::None => "reconstruction loss within normal range",
            RiskLevel::Low => "reconstruction loss exceeded low threshold",
            RiskLevel::Medium => "reconstruction loss exceeded medium threshold",
            RiskLevel::High => "reconstruction loss exceeded high threshold",
        }
    }

    /// Whether this severity raises a persisted alert (MEDIUM or HIGH).
    pub fn raises_alert(&self) -> bool {
        matches!(self, RiskLevel::Medium | RiskLevel::High)
    }

    /// UPPERCASE label as used on the wire and in logs.
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::None => "NONE",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

/// One classified analysis window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// Offset of this window in the source media, seconds from the start.
    pub time_seconds: f64,

    /// Reconstruction loss measured for this window.
    pub loss: f64,

    /// Severity assigned by the classifier.
    pub risk_level: RiskLevel,

    /// Cause string keyed by the severity.
    pub cause: String,
}

impl Sample {
    /// Classify one raw loss value into a sample at the given media offset.
    pub fn classify(time_seconds: f64, loss: f64, cfg: &ThresholdConfig) -> Self {
        let risk_level = RiskLevel::classify(loss, cfg);
        Self {
            time_seconds,
            loss,
            risk_level,
            cause: risk_level.cause().to_string(),
        }
    }
}

/// The structured result of one analysis request.
///
/// Created once per request, immutable after construction, owned by the
/// caller that issued the request — this crate does not cache reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Email of the uploader the report was produced for.
    pub user_email: String,

    /// Location label attached to the request.
    pub location: String,

    /// Maximum severity across samples; NONE for an empty sequence.
    pub risk_level: RiskLevel,

    /// Time of the first sample whose severity reaches `risk_level`.
    /// 0.0 when there are no samples.
    pub event_time_seconds: f64,

    /// Maximum loss over all samples (0.0 if none).
    pub max_loss: f64,

    /// Mean loss over all samples (0.0 if none).
    pub mean_loss: f64,

    /// Whether the service raised a persisted alert for this report.
    ///
    /// Taken verbatim from the service response; this layer never recomputes
    /// it from alert storage. A server-side store failure after the report
    /// was produced is not reconciled here.
    pub alert_created: bool,

    /// Classified windows, ordered by time ascending.
    pub samples: Vec<Sample>,
}

/// A persisted, acknowledgeable record raised when a report reaches
/// MEDIUM or HIGH. Snake_case wire format, matching the store's JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Store-assigned identifier.
    pub id: String,

    /// When the store created the alert (UTC).
    pub created_at: DateTime<Utc>,

    /// Email of the uploader whose report raised the alert.
    pub user_email: String,

    /// Location label from the originating report.
    pub location: String,

    /// Severity that raised the alert (MEDIUM or HIGH).
    pub risk_level: RiskLevel,

    /// Peak loss of the originating report.
    pub risk_score: f64,

    /// Cause string from the originating report.
    #[serde(default)]
    pub cause: String,

    /// Name of the uploaded media file.
    #[serde(default)]
    pub file_name: String,

    /// Media offset of the first alerting sample, seconds.
    #[serde(default)]
    pub event_time_seconds: f64,

    /// Set once by the acknowledge transition; never cleared.
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Whether the NEW → ACKNOWLEDGED transition has happened.
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged_at.is_some()
    }
}

/// Response shape of `GET /api/alerts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsResponse {
    /// Alerts in the store's order (newest first), pre-filtered server-side.
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

/// One live GPS fix published by a sharing session. Ephemeral — only the
/// most recent fix per active session is retained anywhere in this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    /// Email of the sharing user.
    pub user_email: String,

    /// Latitude in degrees.
    pub lat: f64,

    /// Longitude in degrees.
    pub lng: f64,

    /// When the fix was captured (UTC).
    pub captured_at: DateTime<Utc>,
}

/// Response shape of `GET /api/locations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationsResponse {
    /// Most recent fix per actively sharing user.
    #[serde(default)]
    pub locations: Vec<LocationFix>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cfg() -> ThresholdConfig {
        ThresholdConfig::default()
    }

    #[test]
    fn test_classify_tiers() {
        assert_eq!(RiskLevel::classify(0.0005, &cfg()), RiskLevel::None);
        assert_eq!(RiskLevel::classify(0.001, &cfg()), RiskLevel::Low);
        assert_eq!(RiskLevel::classify(0.0013, &cfg()), RiskLevel::Medium);
        assert_eq!(RiskLevel::classify(0.002, &cfg()), RiskLevel::High);
    }

    #[test]
    fn test_classify_boundaries_inclusive_low_edge() {
        // A loss exactly equal to a cutoff opens that tier
        assert_eq!(RiskLevel::classify(0.0008, &cfg()), RiskLevel::Low);
        assert_eq!(RiskLevel::classify(0.0012, &cfg()), RiskLevel::Medium);
        assert_eq!(RiskLevel::classify(0.0016, &cfg()), RiskLevel::High);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(RiskLevel::None < RiskLevel::Low);
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
    }

    #[test]
    fn test_raises_alert_only_medium_and_high() {
        assert!(!RiskLevel::None.raises_alert());
        assert!(!RiskLevel::Low.raises_alert());
        assert!(RiskLevel::Medium.raises_alert());
        assert!(RiskLevel::High.raises_alert());
    }

    #[test]
    fn test_cause_is_deterministic() {
        assert_eq!(RiskLevel::High.cause(), RiskLevel::High.cause());
        assert_eq!(
            RiskLevel::High.cause(),
            "reconstruction loss exceeded high threshold"
        );
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(ThresholdConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_misordered_thresholds() {
        let bad = ThresholdConfig {
            low: 0.0012,
            medium: 0.0008,
            ..ThresholdConfig::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::ThresholdOrder { .. })
        ));

        let equal = ThresholdConfig {
            medium: DEFAULT_THRESHOLD_HIGH,
            ..ThresholdConfig::default()
        };
        assert!(equal.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_nan() {
        let bad = ThresholdConfig {
            medium: f64::NAN,
            ..ThresholdConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_interval() {
        let bad = ThresholdConfig {
            sample_every_seconds: 0.0,
            ..ThresholdConfig::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::NonPositiveInterval(_))
        ));
    }

    #[test]
    fn test_risk_level_wire_format() {
        assert_eq!(
            serde_json::to_string(&RiskLevel::Medium).unwrap(),
            "\"MEDIUM\""
        );
        let level: RiskLevel = serde_json::from_str("\"HIGH\"").unwrap();
        assert_eq!(level, RiskLevel::High);
    }

    #[test]
    fn test_alert_deserializes_store_record() {
        // Shape as persisted by the external store
        let json = r#"{
            "id": "a1",
            "created_at": "2024-03-01T12:00:00+00:00",
            "user_email": "user@example.com",
            "location": "Kandavli",
            "risk_level": "HIGH",
            "risk_score": 0.0021,
            "file_name": "clip.mp4",
            "event_time_seconds": 6.0,
            "acknowledged_at": null
        }"#;
        let alert: Alert = serde_json::from_str(json).unwrap();
        assert_eq!(alert.risk_level, RiskLevel::High);
        assert!(!alert.is_acknowledged());
        // `cause` is absent from older store records and defaults empty
        assert!(alert.cause.is_empty());
    }

    proptest! {
        #[test]
        fn prop_loss_at_or_above_high_is_high(loss in DEFAULT_THRESHOLD_HIGH..1.0f64) {
            prop_assert_eq!(RiskLevel::classify(loss, &cfg()), RiskLevel::High);
        }

        #[test]
        fn prop_medium_band_is_medium(
            loss in DEFAULT_THRESHOLD_MEDIUM..DEFAULT_THRESHOLD_HIGH,
        ) {
            prop_assert_eq!(RiskLevel::classify(loss, &cfg()), RiskLevel::Medium);
        }

        #[test]
        fn prop_low_band_is_low(loss in DEFAULT_THRESHOLD_LOW..DEFAULT_THRESHOLD_MEDIUM) {
            prop_assert_eq!(RiskLevel::classify(loss, &cfg()), RiskLevel::Low);
        }

        #[test]
        fn prop_below_low_is_none(loss in 0.0f64..DEFAULT_THRESHOLD_LOW) {
            prop_assert_eq!(RiskLevel::classify(loss, &cfg()), RiskLevel::None);
        }

        #[test]
        fn prop_classification_is_monotone(a in 0.0f64..1.0, b in 0.0f64..1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(RiskLevel::classify(lo, &cfg()) <= RiskLevel::classify(hi, &cfg()));
        }
    }
}
