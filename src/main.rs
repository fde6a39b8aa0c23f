//! Crowdwatch - client-side orchestration for crowd-risk monitoring.
//!
//! # Usage
//!
//! ```text
//! crowdwatch <video-file> <user-email> [location]
//! ```
//!
//! Submits the clip to the configured analysis service and logs the risk
//! report. Service address, default thresholds, and the fallback location
//! label come from the environment; see [`crowdwatch::config::Config`].

use std::env;
use std::path::PathBuf;

use anyhow::{Context, bail};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crowdwatch::analysis::AnalysisRequest;
use crowdwatch::client::RiskApiClient;
use crowdwatch::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("crowdwatch=info".parse()?))
        .init();

    let mut args = env::args().skip(1);
    let (video_path, user_email) = match (args.next(), args.next()) {
        (Some(path), Some(email)) => (PathBuf::from(path), email),
        _ => bail!("usage: crowdwatch <video-file> <user-email> [location]"),
    };
    let location = args.next();

    let config = Config::from_env();
    info!(base_url = %config.base_url, "Starting analysis");

    let media = tokio::fs::read(&video_path)
        .await
        .with_context(|| format!("failed to read {}", video_path.display()))?;
    let file_name = video_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.mp4");

    let mut request = AnalysisRequest::new(&config, media, file_name, &user_email);
    if let Some(location) = location {
        request = request.with_location(&location);
    }

    let client = RiskApiClient::from_config(&config);
    let report = request.run(&client).await?;

    info!(
        risk_level = report.risk_level.label(),
        event_time_seconds = report.event_time_seconds,
        max_loss = report.max_loss,
        mean_loss = report.mean_loss,
        samples = report.samples.len(),
        "Risk report"
    );
    for sample in &report.samples {
        debug!(
            time_seconds = sample.time_seconds,
            loss = sample.loss,
            risk_level = sample.risk_level.label(),
            cause = %sample.cause,
            "Sample"
        );
    }

    if report.alert_created {
        info!(
            user_email = %report.user_email,
            location = %report.location,
            "Police alerted"
        );
    } else {
        info!("No police alert raised (risk stayed below MEDIUM)");
    }

    Ok(())
}
