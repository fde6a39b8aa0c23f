//! Analysis request assembly and report reduction.
//!
//! Turns a media blob plus parameters into an [`AnalysisReport`]: validate
//! locally, issue exactly one call to the remote analysis service, then
//! reduce the raw per-window loss sequence through the classifier. The
//! reduction is a pure function so the report math is testable without a
//! network.

use tracing::info;

use crate::client::{RawAnalysisResponse, RiskApiClient};
use crate::config::Config;
use crate::error::{AnalysisError, ConfigError};
use crate::model::{AnalysisReport, RiskLevel, Sample, ThresholdConfig};

/// A fully assembled analysis request.
///
/// Built from caller inputs with config-supplied defaults for anything
/// omitted; immutable while the request runs.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Raw media bytes to upload.
    pub media: Vec<u8>,

    /// File name forwarded with the upload (the service checks the suffix).
    pub file_name: String,

    /// Email of the uploading user.
    pub user_email: String,

    /// Location label attached to any resulting alert.
    pub location: String,

    /// Loss cutoffs and sampling interval for this request.
    pub thresholds: ThresholdConfig,
}

impl AnalysisRequest {
    /// Start a request with default location and thresholds from `config`.
    pub fn new(config: &Config, media: Vec<u8>, file_name: &str, user_email: &str) -> Self {
        Self {
            media,
            file_name: file_name.to_string(),
            user_email: user_email.to_string(),
            location: config.default_location.clone(),
            thresholds: config.thresholds,
        }
    }

    /// Override the location label.
    pub fn with_location(mut self, location: &str) -> Self {
        self.location = location.to_string();
        self
    }

    /// Override thresholds and sampling interval.
    pub fn with_thresholds(mut self, thresholds: ThresholdConfig) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Reject invalid input before any network traffic.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.media.is_empty() {
            return Err(ConfigError::EmptyMedia);
        }
        self.thresholds.validate()
    }

    /// Run the request: validate, call the analysis service once, and reduce
    /// the response into a report.
    ///
    /// Remote failure surfaces as [`AnalysisError`] with the server's message;
    /// there is no retry at this layer.
    pub async fn run(&self, client: &RiskApiClient) -> Result<AnalysisReport, AnalysisError> {
        self.validate()?;

        info!(
            user_email = %self.user_email,
            location = %self.location,
            media_bytes = self.media.len(),
            "Submitting media for analysis"
        );

        let raw = client.analyze(self).await?;
        let report = reduce_report(raw, &self.thresholds);

        info!(
            risk_level = report.risk_level.label(),
            event_time_seconds = report.event_time_seconds,
            samples = report.samples.len(),
            alert_created = report.alert_created,
            "Analysis complete"
        );

        Ok(report)
    }
}

/// Reduce a raw per-window loss sequence into a structured report.
///
/// - every raw loss is classified against `cfg`;
/// - report severity is the maximum over samples (NONE if empty);
/// - event time is the first sample attaining that maximum (0.0 if empty);
/// - max/mean loss are 0.0 for an empty sequence;
/// - `alert_created` is carried over from the service response, never
///   recomputed here.
pub fn reduce_report(raw: RawAnalysisResponse, cfg: &ThresholdConfig) -> AnalysisReport {
    let samples: Vec<Sample> = raw
        .samples
        .iter()
        .map(|w| Sample::classify(w.time_seconds, w.loss, cfg))
        .collect();

    let risk_level = samples
        .iter()
        .map(|s| s.risk_level)
        .max()
        .unwrap_or(RiskLevel::None);

    let event_time_seconds = samples
        .iter()
        .find(|s| s.risk_level >= risk_level)
        .map(|s| s.time_seconds)
        .unwrap_or(0.0);

    let max_loss = samples.iter().map(|s| s.loss).fold(0.0, f64::max);
    let mean_loss = if samples.is_empty() {
        0.0
    } else {
        samples.iter().map(|s| s.loss).sum::<f64>() / samples.len() as f64
    };

    AnalysisReport {
        user_email: raw.user_email,
        location: raw.location,
        risk_level,
        event_time_seconds,
        max_loss,
        mean_loss,
        alert_created: raw.alert_created,
        samples,
    }
}
