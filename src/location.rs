//! Live location sharing.
//!
//! [`LocationSession`] is the client-local state machine governing
//! continuous GPS publishing: it negotiates permission through a
//! [`PositionProvider`], keeps at most one position watch alive, and pushes
//! each fix to the external store. The platform seam is a cancelable
//! subscription — `watch()` hands back a stream, dropping it tears the
//! watch down — so a timer-based or callback-based provider looks the same
//! from here.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::RiskApiClient;
use crate::error::LocationError;
use crate::model::LocationFix;

/// Buffered fixes per watch; providers emit at human GPS cadence.
const WATCH_CHANNEL_CAPACITY: usize = 16;

/// Geolocation permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    /// Permission already granted; watching may begin without a prompt.
    Granted,

    /// Permission denied; watching is impossible until the user intervenes.
    Denied,

    /// Permission not yet decided; a prompt would be shown.
    Prompt,
}

/// One raw position from the platform provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPosition {
    /// Latitude in degrees.
    pub lat: f64,

    /// Longitude in degrees.
    pub lng: f64,
}

/// A live position subscription. Dropping the stream cancels the watch on
/// the provider side (its sender starts failing).
pub struct PositionStream {
    rx: mpsc::Receiver<Result<GeoPosition, LocationError>>,
}

impl PositionStream {
    /// Wrap a receiver produced by a provider.
    pub fn new(rx: mpsc::Receiver<Result<GeoPosition, LocationError>>) -> Self {
        Self { rx }
    }

    /// Create a connected sender/stream pair. Providers push fixes (or a
    /// terminal watch error) through the sender.
    pub fn channel() -> (
        mpsc::Sender<Result<GeoPosition, LocationError>>,
        PositionStream,
    ) {
        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
        (tx, PositionStream::new(rx))
    }

    /// Next fix or watch error; `None` once the provider ends the watch.
    pub async fn next(&mut self) -> Option<Result<GeoPosition, LocationError>> {
        self.rx.recv().await
    }
}

/// Platform seam for geolocation.
///
/// `permission` answers without prompting; `request_permission` may prompt
/// the user and is only ever called from an explicit start.
pub trait PositionProvider: Send + Sync {
    /// Current permission state, without prompting.
    fn permission(&self) -> PermissionState;

    /// Obtain permission, prompting if necessary.
    fn request_permission(
        &self,
    ) -> impl Future<Output = Result<PermissionState, LocationError>> + Send;

    /// Start a position watch and return its subscription.
    fn watch(&self) -> Result<PositionStream, LocationError>;
}

/// Sharing session lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionStatus {
    /// No permission requested, no watch active.
    #[default]
    Idle,

    /// A user-triggered start is negotiating permission.
    RequestingPermission,

    /// Permission granted; a position watch is running.
    Active,

    /// Permission denied or the watch failed irrecoverably. No automatic
    /// retry; an explicit start is required.
    Error,

    /// The user deactivated sharing; the watch is torn down.
    Stopped,
}

/// Observable session state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Current lifecycle state.
    pub status: SessionStatus,

    /// Most recent fix captured by the watch, if any.
    pub last_fix: Option<LocationFix>,

    /// Last error message for this activity, retained until superseded by a
    /// success or a newer error.
    pub last_error: Option<String>,

    /// When the store last accepted a fix.
    pub last_sent_at: Option<chrono::DateTime<chrono::Utc>>,
}

struct SessionShared {
    client: RiskApiClient,
    user_email: String,
    state: RwLock<SessionState>,
    // Bumped on every watch change; fixes and in-flight pushes carrying a
    // stale generation are dropped, so nothing lands after a stop.
    generation: AtomicU64,
}

/// The live-location-sharing state machine. One instance per user-role
/// client; create on dashboard entry, stop on logout.
pub struct LocationSession<P: PositionProvider> {
    provider: P,
    shared: Arc<SessionShared>,
    pump: Option<JoinHandle<()>>,
}

impl<P: PositionProvider> LocationSession<P> {
    /// Create an idle session for `user_email`.
    pub fn new(client: RiskApiClient, provider: P, user_email: &str) -> Self {
        Self {
            provider,
            shared: Arc::new(SessionShared {
                client,
                user_email: user_email.to_string(),
                state: RwLock::new(SessionState::default()),
                generation: AtomicU64::new(0),
            }),
            pump: None,
        }
    }

    /// Snapshot of the current session state.
    pub async fn state(&self) -> SessionState {
        self.shared.state.read().await.clone()
    }

    /// Current lifecycle state.
    pub async fn status(&self) -> SessionStatus {
        self.shared.state.read().await.status
    }

    /// User-triggered activation.
    ///
    /// A no-op while a start is already under way or a watch is already
    /// live — toggling rapidly never leaks a second watch. From Idle,
    /// Error, or Stopped this negotiates permission and, when granted,
    /// starts the watch.
    pub async fn start(&mut self) -> Result<(), LocationError> {
        {
            let state = self.shared.state.read().await;
            if matches!(
                state.status,
                SessionStatus::RequestingPermission | SessionStatus::Active
            ) {
                return Ok(());
            }
        }

        // Any stale watch handle is torn down before a new watch starts
        self.teardown_watch();
        self.shared.state.write().await.status = SessionStatus::RequestingPermission;
        info!(user_email = %self.shared.user_email, "Requesting geolocation permission");

        match self.provider.request_permission().await {
            Ok(PermissionState::Granted) => self.begin_watch().await,
            Ok(_) => {
                let err = LocationError::PermissionDenied;
                self.enter_error(&err).await;
                Err(err)
            }
            Err(err) => {
                self.enter_error(&err).await;
                Err(err)
            }
        }
    }

    /// Resume sharing without user action when the platform already reports
    /// permission as granted. Only ever transitions Idle → Active; it never
    /// prompts, and a session in any other state is left alone.
    ///
    /// Returns whether the session became active.
    pub async fn auto_resume(&mut self) -> Result<bool, LocationError> {
        {
            let state = self.shared.state.read().await;
            if state.status != SessionStatus::Idle {
                return Ok(false);
            }
        }
        if self.provider.permission() != PermissionState::Granted {
            return Ok(false);
        }

        self.begin_watch().await?;
        Ok(true)
    }

    /// User-triggered deactivation.
    ///
    /// From Active or Error: tears the watch down, enters Stopped, and sends
    /// one best-effort stop notification to the store (failure is swallowed —
    /// the client-side watch is already gone regardless). Idempotent; calling
    /// it again, or on an Idle session, does nothing.
    pub async fn stop(&mut self) {
        self.teardown_watch();

        let notify_store = {
            let mut state = self.shared.state.write().await;
            match state.status {
                SessionStatus::Active | SessionStatus::Error => {
                    state.status = SessionStatus::Stopped;
                    true
                }
                _ => false,
            }
        };

        if notify_store {
            info!(user_email = %self.shared.user_email, "Location sharing stopped");
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                if let Err(e) = shared.client.stop_location(&shared.user_email).await {
                    debug!(error = %e, "Stop notification failed");
                }
            });
        }
    }

    async fn begin_watch(&mut self) -> Result<(), LocationError> {
        let stream = match self.provider.watch() {
            Ok(stream) => stream,
            Err(err) => {
                self.enter_error(&err).await;
                return Err(err);
            }
        };

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.state.write().await.status = SessionStatus::Active;
        info!(user_email = %self.shared.user_email, "Location sharing active");

        self.pump = Some(tokio::spawn(pump(
            Arc::clone(&self.shared),
            stream,
            generation,
        )));
        Ok(())
    }

    fn teardown_watch(&mut self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.pump.take() {
            task.abort();
        }
    }

    async fn enter_error(&self, err: &LocationError) {
        warn!(error = %err, "Location sharing failed");
        let mut state = self.shared.state.write().await;
        state.status = SessionStatus::Error;
        state.last_error = Some(err.to_string());
    }
}

impl<P: PositionProvider> Drop for LocationSession<P> {
    fn drop(&mut self) {
        // Destroyed on logout or tab close; the watch must not outlive it
        self.teardown_watch();
    }
}

/// Consume the watch stream: record each fix, then push it from its own
/// task so a slow store never delays the next fix. Pushes may overlap; each
/// carries the fix it was dispatched with, never a stale queued one.
async fn pump(shared: Arc<SessionShared>, mut stream: PositionStream, generation: u64) {
    while let Some(item) = stream.next().await {
        if shared.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        match item {
            Ok(position) => {
                let fix = LocationFix {
                    user_email: shared.user_email.clone(),
                    lat: position.lat,
                    lng: position.lng,
                    captured_at: Utc::now(),
                };
                shared.state.write().await.last_fix = Some(fix.clone());
                tokio::spawn(push_fix(Arc::clone(&shared), fix, generation));
            }
            Err(err) => {
                warn!(error = %err, "Position watch failed");
                let mut state = shared.state.write().await;
                state.status = SessionStatus::Error;
                state.last_error = Some(err.to_string());
                return;
            }
        }
    }
}

async fn push_fix(shared: Arc<SessionShared>, fix: LocationFix, generation: u64) {
    let result = shared
        .client
        .update_location(&fix.user_email, fix.lat, fix.lng)
        .await;

    // The session may have stopped while the push was in flight
    if shared.generation.load(Ordering::SeqCst) != generation {
        return;
    }

    let mut state = shared.state.write().await;
    match result {
        Ok(()) => {
            state.last_sent_at = Some(Utc::now());
            state.last_error = None;
        }
        Err(e) => {
            // Transient publish failures do not stop the watch
            warn!(error = %e, "Location update failed; watch continues");
            state.last_error = Some(e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct MockInner {
        permission: PermissionState,
        grant: PermissionState,
        requests: AtomicUsize,
        subscribes: AtomicUsize,
        senders: Mutex<Vec<mpsc::Sender<Result<GeoPosition, LocationError>>>>,
    }

    #[derive(Clone)]
    struct MockProvider {
        inner: Arc<MockInner>,
    }

    impl MockProvider {
        fn new(permission: PermissionState, grant: PermissionState) -> Self {
            Self {
                inner: Arc::new(MockInner {
                    permission,
                    grant,
                    requests: AtomicUsize::new(0),
                    subscribes: AtomicUsize::new(0),
                    senders: Mutex::new(Vec::new()),
                }),
            }
        }

        fn sender(&self) -> mpsc::Sender<Result<GeoPosition, LocationError>> {
            self.inner
                .senders
                .lock()
                .unwrap()
                .last()
                .cloned()
                .expect("no watch subscribed")
        }
    }

    impl PositionProvider for MockProvider {
        fn permission(&self) -> PermissionState {
            self.inner.permission
        }

        fn request_permission(
            &self,
        ) -> impl Future<Output = Result<PermissionState, LocationError>> + Send {
            self.inner.requests.fetch_add(1, Ordering::SeqCst);
            let grant = self.inner.grant;
            async move { Ok(grant) }
        }

        fn watch(&self) -> Result<PositionStream, LocationError> {
            self.inner.subscribes.fetch_add(1, Ordering::SeqCst);
            let (tx, stream) = PositionStream::channel();
            self.inner.senders.lock().unwrap().push(tx);
            Ok(stream)
        }
    }

    fn session(provider: &MockProvider) -> LocationSession<MockProvider> {
        // Unroutable store: pushes fail, which the session tolerates
        LocationSession::new(
            RiskApiClient::new("http://127.0.0.1:1"),
            provider.clone(),
            "user@example.com",
        )
    }

    #[tokio::test]
    async fn test_start_twice_subscribes_once() {
        let provider = MockProvider::new(PermissionState::Prompt, PermissionState::Granted);
        let mut session = session(&provider);

        session.start().await.unwrap();
        session.start().await.unwrap();

        assert_eq!(session.status().await, SessionStatus::Active);
        assert_eq!(provider.inner.subscribes.load(Ordering::SeqCst), 1);
        assert_eq!(provider.inner.requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_permission_denied_enters_error() {
        let provider = MockProvider::new(PermissionState::Prompt, PermissionState::Denied);
        let mut session = session(&provider);

        let result = session.start().await;
        assert!(matches!(result, Err(LocationError::PermissionDenied)));

        let state = session.state().await;
        assert_eq!(state.status, SessionStatus::Error);
        assert!(state.last_error.is_some());
        assert_eq!(provider.inner.subscribes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_restart_after_error_prompts_again() {
        let provider = MockProvider::new(PermissionState::Prompt, PermissionState::Denied);
        let mut session = session(&provider);

        let _ = session.start().await;
        let _ = session.start().await;

        // Error requires explicit re-activation, each going through a prompt
        assert_eq!(provider.inner.requests.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fix_updates_last_fix() {
        let provider = MockProvider::new(PermissionState::Prompt, PermissionState::Granted);
        let mut session = session(&provider);
        session.start().await.unwrap();

        provider
            .sender()
            .send(Ok(GeoPosition {
                lat: 19.07,
                lng: 72.87,
            }))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let state = session.state().await;
        assert_eq!(state.status, SessionStatus::Active);
        let fix = state.last_fix.expect("fix recorded");
        assert_eq!(fix.lat, 19.07);
        assert_eq!(fix.user_email, "user@example.com");
    }

    #[tokio::test]
    async fn test_push_failure_keeps_session_active() {
        let provider = MockProvider::new(PermissionState::Prompt, PermissionState::Granted);
        let mut session = session(&provider);
        session.start().await.unwrap();

        provider
            .sender()
            .send(Ok(GeoPosition { lat: 1.0, lng: 2.0 }))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // The unroutable store makes every push fail; the watch survives
        let state = session.state().await;
        assert_eq!(state.status, SessionStatus::Active);
        assert!(state.last_error.is_some());
        assert!(state.last_sent_at.is_none());
    }

    #[tokio::test]
    async fn test_watch_error_enters_error_state() {
        let provider = MockProvider::new(PermissionState::Prompt, PermissionState::Granted);
        let mut session = session(&provider);
        session.start().await.unwrap();

        provider
            .sender()
            .send(Err(LocationError::WatchFailed("gps lost".to_string())))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let state = session.state().await;
        assert_eq!(state.status, SessionStatus::Error);
        assert!(state.last_error.unwrap().contains("gps lost"));
    }

    #[tokio::test]
    async fn test_fixes_after_stop_are_ignored() {
        let provider = MockProvider::new(PermissionState::Prompt, PermissionState::Granted);
        let mut session = session(&provider);
        session.start().await.unwrap();
        let sender = provider.sender();

        session.stop().await;
        assert_eq!(session.status().await, SessionStatus::Stopped);

        let _ = sender.send(Ok(GeoPosition { lat: 9.0, lng: 9.0 })).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(session.state().await.last_fix.is_none());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let provider = MockProvider::new(PermissionState::Prompt, PermissionState::Granted);
        let mut session = session(&provider);
        session.start().await.unwrap();

        session.stop().await;
        session.stop().await;
        assert_eq!(session.status().await, SessionStatus::Stopped);
    }

    #[tokio::test]
    async fn test_auto_resume_with_granted_permission() {
        let provider = MockProvider::new(PermissionState::Granted, PermissionState::Granted);
        let mut session = session(&provider);

        let resumed = session.auto_resume().await.unwrap();
        assert!(resumed);
        assert_eq!(session.status().await, SessionStatus::Active);
        // No prompt on auto-resume
        assert_eq!(provider.inner.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_auto_resume_never_prompts() {
        let provider = MockProvider::new(PermissionState::Prompt, PermissionState::Granted);
        let mut session = session(&provider);

        let resumed = session.auto_resume().await.unwrap();
        assert!(!resumed);
        assert_eq!(session.status().await, SessionStatus::Idle);
        assert_eq!(provider.inner.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_auto_resume_only_from_idle() {
        let provider = MockProvider::new(PermissionState::Granted, PermissionState::Granted);
        let mut session = session(&provider);
        session.start().await.unwrap();
        session.stop().await;

        let resumed = session.auto_resume().await.unwrap();
        assert!(!resumed);
        assert_eq!(session.status().await, SessionStatus::Stopped);
    }
}
