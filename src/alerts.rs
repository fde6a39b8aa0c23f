//! Alert polling and acknowledgment.
//!
//! [`AlertPoller`] keeps an eventually-consistent local view of the store's
//! alert set by fetching on a fixed cadence and replacing the view wholesale
//! — the server is the sole source of truth, so last-fetch-wins avoids
//! stale-entry bugs. [`Acknowledger`] drives the one-way NEW → ACKNOWLEDGED
//! transition with a per-alert single-flight guard and defers the resulting
//! state change to a poller refresh, so `acknowledged_at` is always the
//! server's timestamp.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Notify, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::client::RiskApiClient;
use crate::error::AckError;
use crate::model::{Alert, RiskLevel};

/// Fixed polling cadence.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// The local, read-through view of the store's alert set.
#[derive(Debug, Clone, Default)]
pub struct AlertView {
    /// Alerts exactly as the last successful fetch returned them.
    pub alerts: Vec<Alert>,

    /// Message of the most recent failed fetch, cleared on success.
    pub last_error: Option<String>,
}

/// Derived statistics over an alert view.
///
/// Always computed freshly from the current view — never cached separately,
/// so they cannot diverge from the alerts they describe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertStats {
    /// Total alerts in the view.
    pub total: usize,

    /// Alerts still awaiting acknowledgment.
    pub unacknowledged: usize,

    /// Alerts at MEDIUM severity.
    pub medium: usize,

    /// Alerts at HIGH severity.
    pub high: usize,
}

impl AlertStats {
    /// Compute statistics over a slice of alerts.
    pub fn from_alerts(alerts: &[Alert]) -> Self {
        Self {
            total: alerts.len(),
            unacknowledged: alerts.iter().filter(|a| !a.is_acknowledged()).count(),
            medium: alerts
                .iter()
                .filter(|a| a.risk_level == RiskLevel::Medium)
                .count(),
            high: alerts
                .iter()
                .filter(|a| a.risk_level == RiskLevel::High)
                .count(),
        }
    }
}

struct PollerShared {
    client: RiskApiClient,
    view: RwLock<AlertView>,
    include_acknowledged: AtomicBool,
    refresh: Notify,
}

/// Background poller for the alert store.
///
/// Fetches every [`POLL_INTERVAL`] with exactly one outstanding request at a
/// time — a cycle's fetch is awaited before the next tick fires, so a slow
/// store never piles up concurrent fetches. The loop stops on [`stop`] or
/// when the poller is dropped.
///
/// [`stop`]: AlertPoller::stop
pub struct AlertPoller {
    shared: Arc<PollerShared>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl AlertPoller {
    /// Spawn the polling task. The first fetch happens immediately.
    pub fn spawn(client: RiskApiClient, include_acknowledged: bool) -> Self {
        let shared = Arc::new(PollerShared {
            client,
            view: RwLock::new(AlertView::default()),
            include_acknowledged: AtomicBool::new(include_acknowledged),
            refresh: Notify::new(),
        });
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(Self::run(Arc::clone(&shared), shutdown_rx));

        Self {
            shared,
            shutdown,
            task,
        }
    }

    async fn run(shared: Arc<PollerShared>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        // A slow fetch delays the next tick instead of bursting afterwards
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shared.refresh.notified() => {}
                _ = shutdown.changed() => {
                    debug!("Alert poller stopped");
                    return;
                }
            }
            Self::poll_once(&shared).await;
        }
    }

    /// One poll cycle: fetch, then replace the view wholesale on success.
    /// A failed fetch keeps the previous view and records the error; the
    /// cadence continues and the next tick retries unconditionally.
    async fn poll_once(shared: &PollerShared) {
        let include = shared.include_acknowledged.load(Ordering::Relaxed);
        match shared.client.fetch_alerts(include).await {
            Ok(alerts) => {
                debug!(count = alerts.len(), include, "Alert view refreshed");
                let mut view = shared.view.write().await;
                view.alerts = alerts;
                view.last_error = None;
            }
            Err(e) => {
                warn!(error = %e, "Alert fetch failed; previous view retained");
                shared.view.write().await.last_error = Some(e.to_string());
            }
        }
    }

    /// Snapshot of the current view.
    pub async fn view(&self) -> AlertView {
        self.shared.view.read().await.clone()
    }

    /// Statistics computed freshly from the current view.
    pub async fn stats(&self) -> AlertStats {
        AlertStats::from_alerts(&self.shared.view.read().await.alerts)
    }

    /// Request an immediate out-of-band fetch in addition to the cadence.
    pub fn refresh_now(&self) {
        self.shared.refresh.notify_one();
    }

    /// Change the acknowledged-alerts filter. Triggers an immediate fetch.
    pub fn set_include_acknowledged(&self, include: bool) {
        self.shared
            .include_acknowledged
            .store(include, Ordering::Relaxed);
        self.refresh_now();
    }

    /// Current filter setting.
    pub fn include_acknowledged(&self) -> bool {
        self.shared.include_acknowledged.load(Ordering::Relaxed)
    }

    /// Stop the polling loop. Idempotent; safe to call more than once.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Whether the polling task has exited.
    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for AlertPoller {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Drives the NEW → ACKNOWLEDGED transition with per-alert single-flight.
pub struct Acknowledger {
    client: RiskApiClient,
    in_flight: Mutex<HashSet<String>>,
}

impl Acknowledger {
    /// Create a workflow bound to the given client.
    pub fn new(client: RiskApiClient) -> Self {
        Self {
            client,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Whether an acknowledge for this alert is currently outstanding.
    /// UI boundaries use this as the busy marker to disable the action.
    pub async fn is_busy(&self, alert_id: &str) -> bool {
        self.in_flight.lock().await.contains(alert_id)
    }

    /// Acknowledge one alert and trigger a poller refresh on success.
    ///
    /// A second call for the same id while one is outstanding fails with
    /// [`AckError::InFlight`] without issuing an external call. The guard is
    /// released whether the call succeeds or fails. The local view is never
    /// patched here — the refresh makes the server's `acknowledged_at`
    /// authoritative.
    pub async fn acknowledge(
        &self,
        poller: &AlertPoller,
        alert_id: &str,
    ) -> Result<Alert, AckError> {
        {
            let mut guard = self.in_flight.lock().await;
            if !guard.insert(alert_id.to_string()) {
                return Err(AckError::InFlight(alert_id.to_string()));
            }
        }

        let result = self.client.acknowledge_alert(alert_id).await;
        self.in_flight.lock().await.remove(alert_id);

        match result {
            Ok(alert) => {
                debug!(alert_id, "Alert acknowledged; refreshing view");
                poller.refresh_now();
                Ok(alert)
            }
            Err(e) => {
                warn!(alert_id, error = %e, "Acknowledge failed; alert stays NEW");
                Err(e)
            }
        }
    }
}
