//! HTTP client for the external analysis service and alert/location store.
//!
//! All orchestration components talk to the outside world through
//! [`RiskApiClient`]; nothing else in the crate owns a socket. Non-success
//! responses surface the server's body text as the error message, falling
//! back to a status-based message when the body is empty — matching the
//! store's own convention of putting the human-readable reason in the body.

use reqwest::multipart;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::analysis::AnalysisRequest;
use crate::config::Config;
use crate::error::{AckError, AnalysisError, FetchError, LocationError};
use crate::model::{Alert, AlertsResponse, LocationFix, LocationsResponse};

/// Client for the crowd-risk backend API.
#[derive(Clone)]
pub struct RiskApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl RiskApiClient {
    /// Create a client for the given base URL (trailing slash tolerated).
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a client from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.base_url)
    }

    /// The base URL this client targets.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit media for analysis and return the raw per-window response.
    ///
    /// Issues exactly one `POST /api/analyze` multipart request carrying the
    /// media bytes and parameters. The caller validates the request before
    /// this is reached; see [`AnalysisRequest::run`] for the full flow.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<RawAnalysisResponse, AnalysisError> {
        let thresholds = request.thresholds;
        let form = multipart::Form::new()
            .part(
                "file",
                multipart::Part::bytes(request.media.clone()).file_name(request.file_name.clone()),
            )
            .text("userEmail", request.user_email.clone())
            .text("location", request.location.clone())
            .text("analyzer", "autoencoder")
            .text(
                "sampleEverySeconds",
                thresholds.sample_every_seconds.to_string(),
            )
            .text("thresholdLow", thresholds.low.to_string())
            .text("thresholdMedium", thresholds.medium.to_string())
            .text("thresholdHigh", thresholds.high.to_string())
            .text("includeLosses", "true");

        let response = self
            .client
            .post(format!("{}/api/analyze", self.base_url))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AnalysisError::Status(failure_message(response).await));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| AnalysisError::Decode(e.to_string()))
    }

    /// Fetch the current alert set.
    ///
    /// `include_acknowledged` is forwarded verbatim; the store does the
    /// filtering and this layer trusts the result without re-filtering.
    pub async fn fetch_alerts(&self, include_acknowledged: bool) -> Result<Vec<Alert>, FetchError> {
        let url = format!(
            "{}/api/alerts?includeAcknowledged={}",
            self.base_url, include_acknowledged
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(failure_message(response).await));
        }

        let body = response.text().await?;
        let parsed: AlertsResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(parsed.alerts)
    }

    /// Acknowledge one alert. Idempotent on the store side: acknowledging an
    /// already-acknowledged alert returns the record unchanged.
    pub async fn acknowledge_alert(&self, alert_id: &str) -> Result<Alert, AckError> {
        let url = format!("{}/api/alerts/{}/ack", self.base_url, alert_id);

        let response = self.client.post(&url).send().await?;
        if !response.status().is_success() {
            return Err(AckError::Status(failure_message(response).await));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| AckError::Decode(e.to_string()))
    }

    /// Push one live GPS fix to the store.
    pub async fn update_location(
        &self,
        user_email: &str,
        lat: f64,
        lng: f64,
    ) -> Result<(), LocationError> {
        let url = format!("{}/api/location/update", self.base_url);
        let payload = json!({ "userEmail": user_email, "lat": lat, "lng": lng });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LocationError::Publish(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LocationError::Publish(failure_message(response).await));
        }
        Ok(())
    }

    /// Tell the store a user stopped sharing their location.
    pub async fn stop_location(&self, user_email: &str) -> Result<(), LocationError> {
        let url = format!("{}/api/location/stop", self.base_url);
        let payload = json!({ "userEmail": user_email });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LocationError::Publish(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LocationError::Publish(failure_message(response).await));
        }
        Ok(())
    }

    /// Fetch the most recent fix per actively sharing user (police view).
    pub async fn fetch_locations(&self) -> Result<Vec<LocationFix>, FetchError> {
        let url = format!("{}/api/locations", self.base_url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(failure_message(response).await));
        }

        let body = response.text().await?;
        let parsed: LocationsResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(parsed.locations)
    }
}

/// Extract the error message from a failed response: the body when present,
/// otherwise a status-based fallback.
async fn failure_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(body) if !body.trim().is_empty() => body,
        _ => format!("status {status}"),
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// Raw response of `POST /api/analyze` before client-side reduction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAnalysisResponse {
    /// Email echoed back by the service.
    #[serde(default)]
    pub user_email: String,

    /// Location label echoed back by the service.
    #[serde(default)]
    pub location: String,

    /// Whether the service raised a persisted alert for this analysis.
    /// The service applies the same MEDIUM/HIGH rule this layer displays.
    #[serde(default)]
    pub alert_created: bool,

    /// Per-window losses with timestamps, ordered by time ascending.
    #[serde(default)]
    pub samples: Vec<RawWindow>,
}

/// One raw analysis window as returned by the service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWindow {
    /// Offset of the window in the source media, seconds.
    pub time_seconds: f64,

    /// Reconstruction loss for the window.
    pub loss: f64,
}
