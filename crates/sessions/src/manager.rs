//! Session registry and lifecycle controller.

use std::{collections::HashMap, sync::Arc};

use {
    async_trait::async_trait,
    serde::Serialize,
    tokio::sync::{Mutex, RwLock},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use {
    charla_common::{Error, InboundMessage, Result},
    charla_config::SessionsConfig,
    charla_connector::{ClientOp, Connector, ConnectorEvent, OpOutput},
};

use crate::qr;

/// Collaborator that decides whether a tenant token may hold a session.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// `Ok(true)` accepted, `Ok(false)` rejected. `Err` only when the
    /// validation service itself is unreachable.
    async fn validate(&self, token: &str) -> Result<bool>;
}

/// Receiver for inbound messages of logged-in sessions.
#[async_trait]
pub trait InboundSink: Send + Sync {
    async fn handle(&self, token: &str, message: InboundMessage);
}

/// Result of an `initialize` call.
#[derive(Debug, Clone, Serialize)]
pub struct InitOutcome {
    pub logged_in: bool,
    pub message: String,
}

/// Result of a bulk shutdown.
#[derive(Debug, Clone, Serialize)]
pub struct ShutdownReport {
    /// Sessions removed from the registry.
    pub closed: usize,
    /// Per-entry close failures; never abort the sweep.
    pub errors: Vec<String>,
}

/// Point-in-time view of one session, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub token: String,
    pub logged_in: bool,
    pub qr_attempts: u32,
    pub qr_pending: bool,
}

#[derive(Default)]
struct SessionState {
    qr_payload: Option<String>,
    qr_attempts: u32,
    logged_in: bool,
}

/// One tenant session. State is only mutated through
/// [`SessionManager::apply_event`] and the manager's own operations.
struct Session {
    state: Mutex<SessionState>,
    /// Cancels in-flight work tied to this session on destroy.
    cancel: CancellationToken,
}

impl Session {
    fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            cancel: CancellationToken::new(),
        }
    }
}

/// Registry of tenant sessions plus the lifecycle state machine.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    connector: Arc<dyn Connector>,
    validator: Arc<dyn TokenValidator>,
    sink: RwLock<Option<Arc<dyn InboundSink>>>,
    config: SessionsConfig,
}

impl SessionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        validator: Arc<dyn TokenValidator>,
        config: SessionsConfig,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            connector,
            validator,
            sink: RwLock::new(None),
            config,
        }
    }

    /// Wire the inbound message sink (the auto-reply router).
    pub async fn set_inbound_sink(&self, sink: Arc<dyn InboundSink>) {
        *self.sink.write().await = Some(sink);
    }

    async fn get(&self, token: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(token).cloned()
    }

    pub async fn has_session(&self, token: &str) -> bool {
        self.sessions.read().await.contains_key(token)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Diagnostic view of one session.
    pub async fn snapshot(&self, token: &str) -> Option<SessionSnapshot> {
        let session = self.get(token).await?;
        let state = session.state.lock().await;
        Some(SessionSnapshot {
            token: token.to_string(),
            logged_in: state.logged_in,
            qr_attempts: state.qr_attempts,
            qr_pending: state.qr_payload.is_some(),
        })
    }

    fn auth_dir_for(&self, token: &str) -> Option<String> {
        self.config
            .auth_cache_dir
            .as_ref()
            .map(|root| root.join(token).to_string_lossy().into_owned())
    }

    /// Create a session for a token, or report the existing one.
    ///
    /// Initialization is fire-and-forget: the underlying login proceeds
    /// asynchronously and the caller polls QR/readiness via separate calls.
    pub async fn initialize(&self, token: &str) -> Result<InitOutcome> {
        if let Some(session) = self.get(token).await {
            let logged_in = session.state.lock().await.logged_in;
            return Ok(InitOutcome {
                logged_in,
                message: "already initialized".into(),
            });
        }

        match self.validator.validate(token).await {
            Ok(true) => {},
            Ok(false) => return Err(Error::InvalidToken),
            Err(e) => return Err(e),
        }

        // A concurrent initialize may have won while validation was in
        // flight; the registry check is repeated under the write lock.
        let created = {
            let mut sessions = self.sessions.write().await;
            if sessions.contains_key(token) {
                None
            } else {
                let session = Arc::new(Session::new());
                sessions.insert(token.to_string(), Arc::clone(&session));
                Some(session)
            }
        };

        if created.is_none() {
            let logged_in = self.check_session(token).await.unwrap_or(false);
            return Ok(InitOutcome {
                logged_in,
                message: "already initialized".into(),
            });
        }

        if let Err(e) = self.connector.login(token, self.auth_dir_for(token)).await {
            // Roll the entry back so a retry can recreate it.
            self.sessions.write().await.remove(token);
            return Err(e);
        }

        info!(token, "session initialized");
        Ok(InitOutcome {
            logged_in: false,
            message: "initialized".into(),
        })
    }

    /// Single mutation entry point for the connector's event stream.
    ///
    /// Events never raise to a caller; they log and mutate state only.
    pub async fn apply_event(&self, event: ConnectorEvent) {
        match event {
            ConnectorEvent::Qr { token, payload } => {
                let Some(session) = self.get(&token).await else {
                    debug!(token, "QR event for unknown session");
                    return;
                };
                let attempts = {
                    let mut state = session.state.lock().await;
                    state.qr_payload = Some(payload);
                    state.qr_attempts += 1;
                    state.qr_attempts
                };
                debug!(token, attempts, "QR received");
                if attempts >= self.config.max_qr_attempts {
                    warn!(token, attempts, "QR attempt cap reached, destroying session");
                    self.destroy(&token).await;
                }
            },
            ConnectorEvent::Ready { token } => {
                let Some(session) = self.get(&token).await else {
                    debug!(token, "ready event for unknown session");
                    return;
                };
                let mut state = session.state.lock().await;
                state.logged_in = true;
                state.qr_payload = None;
                state.qr_attempts = 0;
                info!(token, "session ready");
            },
            ConnectorEvent::Authenticated { token } => {
                // Informational; `ready` is authoritative for login state.
                info!(token, "session authenticated");
            },
            ConnectorEvent::AuthFailure { token, message } => {
                warn!(token, message, "authentication failure");
                if let Some(session) = self.get(&token).await {
                    session.state.lock().await.logged_in = false;
                }
            },
            ConnectorEvent::Disconnected { token, reason } => {
                warn!(token, reason, "session disconnected");
                if let Some(session) = self.get(&token).await {
                    let mut state = session.state.lock().await;
                    state.logged_in = false;
                    state.qr_payload = None;
                }
                self.destroy(&token).await;
            },
            msg @ ConnectorEvent::Message { .. } => {
                let Some((token, message)) = msg.into_inbound() else {
                    return;
                };
                let Some(session) = self.get(&token).await else {
                    debug!(token, "message for unknown session");
                    return;
                };
                if !session.state.lock().await.logged_in {
                    debug!(token, "dropping message for session that is not ready");
                    return;
                }
                let sink = self.sink.read().await.clone();
                if let Some(sink) = sink {
                    // Routing work dies with the session.
                    let cancel = session.cancel.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            () = cancel.cancelled() => {},
                            () = sink.handle(&token, message) => {},
                        }
                    });
                }
            },
            ConnectorEvent::CommandResult { request_id, .. } => {
                // Correlation is the transport's job; nothing to do here.
                debug!(request_id, "stray command result");
            },
        }
    }

    /// Encode the pending login QR as a PNG data URL.
    pub async fn generate_qr(&self, token: &str) -> Result<String> {
        let session = self.get(token).await.ok_or(Error::NotInitialized)?;
        let state = session.state.lock().await;
        if state.qr_attempts >= self.config.max_qr_attempts {
            return Err(Error::AttemptsExceeded);
        }
        let payload = state.qr_payload.as_deref().ok_or(Error::NotAvailable)?;
        qr::png_data_url(payload)
    }

    pub async fn check_session(&self, token: &str) -> Result<bool> {
        let session = self.get(token).await.ok_or(Error::NotInitialized)?;
        let state = session.state.lock().await;
        Ok(state.logged_in)
    }

    /// Log a session out and destroy it.
    ///
    /// An underlying logout failure keeps the registry entry so the caller
    /// can retry; only a successful logout removes it.
    pub async fn logout(&self, token: &str) -> Result<()> {
        let session = self.get(token).await.ok_or(Error::NotInitialized)?;
        self.connector.logout(token).await?;
        {
            let mut state = session.state.lock().await;
            state.logged_in = false;
            state.qr_payload = None;
            state.qr_attempts = 0;
        }
        self.destroy(token).await;
        info!(token, "session logged out");
        Ok(())
    }

    /// Delegate an operation to the underlying connection.
    ///
    /// Shared guard for the whole pass-through family: the session must
    /// exist and be logged in, otherwise no delegation call is made.
    pub async fn execute(&self, token: &str, op: ClientOp) -> Result<OpOutput> {
        let logged_in = match self.get(token).await {
            Some(session) => session.state.lock().await.logged_in,
            None => false,
        };
        if !logged_in {
            return Err(Error::NotLoggedIn);
        }
        self.connector.invoke(token, op).await
    }

    /// Remove a session from the registry, then release its resources.
    ///
    /// The entry is gone before the underlying close, so no lookup can
    /// observe a registered session whose connection is already released.
    async fn destroy(&self, token: &str) {
        let removed = self.sessions.write().await.remove(token);
        let Some(session) = removed else {
            return;
        };
        session.cancel.cancel();
        if let Err(e) = self.connector.close(token).await {
            warn!(token, error = %e, "failed to close underlying connection");
        }
        debug!(token, "session destroyed");
    }

    /// Destroy every session and clear on-disk caches.
    ///
    /// Guarded by the configured admin secret; a mismatch performs no
    /// destructive action. Per-entry close failures are collected, never
    /// fatal.
    pub async fn shutdown_all(&self, secret: &str) -> Result<ShutdownReport> {
        if self.config.admin_secret.is_empty() || secret != self.config.admin_secret {
            return Err(Error::Forbidden);
        }

        let drained: Vec<(String, Arc<Session>)> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().collect()
        };

        let closed = drained.len();
        let mut errors = Vec::new();
        for (token, session) in drained {
            session.cancel.cancel();
            if let Err(e) = self.connector.close(&token).await {
                warn!(token, error = %e, "failed to close session during bulk shutdown");
                errors.push(format!("{token}: {e}"));
            }
        }

        for dir in [
            self.config.auth_cache_dir.as_ref(),
            self.config.browser_cache_dir.as_ref(),
        ]
        .into_iter()
        .flatten()
        {
            if let Err(e) = tokio::fs::remove_dir_all(dir).await
                && e.kind() != std::io::ErrorKind::NotFound
            {
                warn!(path = %dir.display(), error = %e, "failed to remove cache directory");
            }
        }

        info!(closed, failures = errors.len(), "bulk shutdown complete");
        Ok(ShutdownReport { closed, errors })
    }
}

/// Bridge the connector's synchronous event callback onto the manager.
///
/// The transport callback pushes into the channel; the pump applies events
/// in arrival order.
pub fn spawn_event_pump(
    manager: Arc<SessionManager>,
    mut events: tokio::sync::mpsc::UnboundedReceiver<ConnectorEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            manager.apply_event(event).await;
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct MockConnector {
        login_calls: AtomicUsize,
        invoke_calls: AtomicUsize,
        logout_calls: AtomicUsize,
        closed: Mutex<Vec<String>>,
        fail_logout: bool,
        fail_close_for: Option<String>,
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn login(&self, _token: &str, _auth_dir: Option<String>) -> Result<()> {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn logout(&self, _token: &str) -> Result<()> {
            self.logout_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_logout {
                Err(Error::UpstreamError("logout refused".into()))
            } else {
                Ok(())
            }
        }

        async fn close(&self, token: &str) -> Result<()> {
            self.closed.lock().await.push(token.to_string());
            if self.fail_close_for.as_deref() == Some(token) {
                Err(Error::UpstreamError("close failed".into()))
            } else {
                Ok(())
            }
        }

        async fn invoke(&self, _token: &str, _op: ClientOp) -> Result<OpOutput> {
            self.invoke_calls.fetch_add(1, Ordering::SeqCst);
            Ok(OpOutput::Ack)
        }
    }

    struct StaticValidator(Result<bool>);

    #[async_trait]
    impl TokenValidator for StaticValidator {
        async fn validate(&self, _token: &str) -> Result<bool> {
            match &self.0 {
                Ok(v) => Ok(*v),
                Err(_) => Err(Error::ValidationServiceError("unreachable".into())),
            }
        }
    }

    fn manager_with(connector: Arc<MockConnector>, valid: Result<bool>) -> SessionManager {
        let config = SessionsConfig {
            admin_secret: "s3cret".into(),
            ..SessionsConfig::default()
        };
        SessionManager::new(connector, Arc::new(StaticValidator(valid)), config)
    }

    fn qr_event(token: &str) -> ConnectorEvent {
        ConnectorEvent::Qr {
            token: token.into(),
            payload: "1@QR".into(),
        }
    }

    fn ready_event(token: &str) -> ConnectorEvent {
        ConnectorEvent::Ready {
            token: token.into(),
        }
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let connector = Arc::new(MockConnector::default());
        let mgr = manager_with(Arc::clone(&connector), Ok(true));

        let first = mgr.initialize("t1").await.unwrap();
        assert!(!first.logged_in);
        assert_eq!(first.message, "initialized");

        let second = mgr.initialize("t1").await.unwrap();
        assert_eq!(second.message, "already initialized");

        // Only one underlying connection was ever created.
        assert_eq!(connector.login_calls.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.session_count().await, 1);
    }

    #[tokio::test]
    async fn rejected_token_creates_no_session() {
        let connector = Arc::new(MockConnector::default());
        let mgr = manager_with(Arc::clone(&connector), Ok(false));

        let err = mgr.initialize("bad").await.unwrap_err();
        assert!(matches!(err, Error::InvalidToken));
        assert_eq!(mgr.session_count().await, 0);
        assert_eq!(connector.login_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unreachable_validator_is_distinct_from_rejection() {
        let connector = Arc::new(MockConnector::default());
        let mgr = manager_with(connector, Err(Error::ValidationServiceError(String::new())));

        let err = mgr.initialize("t1").await.unwrap_err();
        assert!(matches!(err, Error::ValidationServiceError(_)));
        assert_eq!(mgr.session_count().await, 0);
    }

    #[tokio::test]
    async fn qr_cap_destroys_session() {
        let connector = Arc::new(MockConnector::default());
        let mgr = manager_with(Arc::clone(&connector), Ok(true));
        mgr.initialize("t1").await.unwrap();

        for _ in 0..4 {
            mgr.apply_event(qr_event("t1")).await;
            assert!(mgr.has_session("t1").await);
        }

        // Fifth issuance hits the cap; the session is gone on next lookup.
        mgr.apply_event(qr_event("t1")).await;
        assert!(!mgr.has_session("t1").await);
        assert_eq!(connector.closed.lock().await.as_slice(), ["t1"]);
        assert!(matches!(
            mgr.check_session("t1").await.unwrap_err(),
            Error::NotInitialized
        ));
    }

    #[tokio::test]
    async fn ready_resets_qr_state() {
        let connector = Arc::new(MockConnector::default());
        let mgr = manager_with(connector, Ok(true));
        mgr.initialize("t1").await.unwrap();

        mgr.apply_event(qr_event("t1")).await;
        mgr.apply_event(qr_event("t1")).await;
        mgr.apply_event(ready_event("t1")).await;

        let snap = mgr.snapshot("t1").await.unwrap();
        assert!(snap.logged_in);
        assert_eq!(snap.qr_attempts, 0);
        assert!(!snap.qr_pending);

        // Counter was reset, so the cap is five fresh issuances away.
        for _ in 0..4 {
            mgr.apply_event(qr_event("t1")).await;
        }
        assert!(mgr.has_session("t1").await);
    }

    #[tokio::test]
    async fn login_state_follows_events() {
        let connector = Arc::new(MockConnector::default());
        let mgr = manager_with(connector, Ok(true));
        mgr.initialize("t1").await.unwrap();

        assert!(!mgr.check_session("t1").await.unwrap());

        // `authenticated` alone does not flip the flag; `ready` does.
        mgr.apply_event(ConnectorEvent::Authenticated { token: "t1".into() })
            .await;
        assert!(!mgr.check_session("t1").await.unwrap());

        mgr.apply_event(ready_event("t1")).await;
        assert!(mgr.check_session("t1").await.unwrap());

        mgr.apply_event(ConnectorEvent::AuthFailure {
            token: "t1".into(),
            message: "expired".into(),
        })
        .await;
        assert!(!mgr.check_session("t1").await.unwrap());
    }

    #[tokio::test]
    async fn disconnect_destroys_session() {
        let connector = Arc::new(MockConnector::default());
        let mgr = manager_with(Arc::clone(&connector), Ok(true));
        mgr.initialize("t1").await.unwrap();
        mgr.apply_event(ready_event("t1")).await;

        mgr.apply_event(ConnectorEvent::Disconnected {
            token: "t1".into(),
            reason: "phone offline".into(),
        })
        .await;

        assert!(!mgr.has_session("t1").await);
        assert_eq!(connector.closed.lock().await.as_slice(), ["t1"]);
    }

    #[tokio::test]
    async fn generate_qr_outcomes() {
        let connector = Arc::new(MockConnector::default());
        let mgr = manager_with(connector, Ok(true));

        assert!(matches!(
            mgr.generate_qr("t1").await.unwrap_err(),
            Error::NotInitialized
        ));

        mgr.initialize("t1").await.unwrap();
        assert!(matches!(
            mgr.generate_qr("t1").await.unwrap_err(),
            Error::NotAvailable
        ));

        mgr.apply_event(qr_event("t1")).await;
        let url = mgr.generate_qr("t1").await.unwrap();
        assert!(url.starts_with("data:image/png;base64,"));

        // After login the payload is cleared again.
        mgr.apply_event(ready_event("t1")).await;
        assert!(matches!(
            mgr.generate_qr("t1").await.unwrap_err(),
            Error::NotAvailable
        ));
    }

    #[tokio::test]
    async fn passthrough_guard_blocks_without_login() {
        let connector = Arc::new(MockConnector::default());
        let mgr = manager_with(Arc::clone(&connector), Ok(true));

        // Absent session.
        let err = mgr
            .execute("t1", ClientOp::GetChats)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotLoggedIn));

        // Present but not ready.
        mgr.initialize("t1").await.unwrap();
        let err = mgr
            .execute("t1", ClientOp::GetChats)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotLoggedIn));
        assert_eq!(connector.invoke_calls.load(Ordering::SeqCst), 0);

        mgr.apply_event(ready_event("t1")).await;
        mgr.execute("t1", ClientOp::GetChats).await.unwrap();
        assert_eq!(connector.invoke_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_logout_keeps_entry() {
        let connector = Arc::new(MockConnector {
            fail_logout: true,
            ..MockConnector::default()
        });
        let mgr = manager_with(Arc::clone(&connector), Ok(true));
        mgr.initialize("t1").await.unwrap();
        mgr.apply_event(ready_event("t1")).await;

        let err = mgr.logout("t1").await.unwrap_err();
        assert!(matches!(err, Error::UpstreamError(_)));
        // Entry retained so the caller can retry.
        assert!(mgr.has_session("t1").await);
        assert!(mgr.check_session("t1").await.unwrap());
    }

    #[tokio::test]
    async fn successful_logout_removes_entry() {
        let connector = Arc::new(MockConnector::default());
        let mgr = manager_with(Arc::clone(&connector), Ok(true));
        mgr.initialize("t1").await.unwrap();
        mgr.apply_event(ready_event("t1")).await;

        mgr.logout("t1").await.unwrap();
        assert!(!mgr.has_session("t1").await);
        assert_eq!(connector.logout_calls.load(Ordering::SeqCst), 1);
        assert_eq!(connector.closed.lock().await.as_slice(), ["t1"]);
    }

    #[tokio::test]
    async fn shutdown_requires_secret() {
        let connector = Arc::new(MockConnector::default());
        let mgr = manager_with(Arc::clone(&connector), Ok(true));
        mgr.initialize("t1").await.unwrap();

        let err = mgr.shutdown_all("wrong").await.unwrap_err();
        assert!(matches!(err, Error::Forbidden));
        // No destructive side effects happened.
        assert!(mgr.has_session("t1").await);
        assert!(connector.closed.lock().await.is_empty());
    }

    #[tokio::test]
    async fn shutdown_continues_past_close_failures() {
        let connector = Arc::new(MockConnector {
            fail_close_for: Some("t1".into()),
            ..MockConnector::default()
        });
        let mgr = manager_with(Arc::clone(&connector), Ok(true));
        mgr.initialize("t1").await.unwrap();
        mgr.initialize("t2").await.unwrap();

        let report = mgr.shutdown_all("s3cret").await.unwrap();
        assert_eq!(report.closed, 2);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("t1:"));
        assert_eq!(mgr.session_count().await, 0);
        assert_eq!(connector.closed.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn shutdown_clears_cache_directories() {
        let dir = tempfile::tempdir().unwrap();
        let auth = dir.path().join("auth-cache");
        let cache = dir.path().join("browser-cache");
        std::fs::create_dir_all(auth.join("t1")).unwrap();
        std::fs::create_dir_all(&cache).unwrap();

        let config = SessionsConfig {
            admin_secret: "s3cret".into(),
            auth_cache_dir: Some(auth.clone()),
            browser_cache_dir: Some(cache.clone()),
            ..SessionsConfig::default()
        };
        let mgr = SessionManager::new(
            Arc::new(MockConnector::default()),
            Arc::new(StaticValidator(Ok(true))),
            config,
        );

        mgr.shutdown_all("s3cret").await.unwrap();
        assert!(!auth.exists());
        assert!(!cache.exists());
    }

    struct RecordingSink {
        received: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl InboundSink for RecordingSink {
        async fn handle(&self, token: &str, message: InboundMessage) {
            self.received
                .lock()
                .await
                .push((token.to_string(), message.body));
        }
    }

    #[tokio::test]
    async fn messages_reach_sink_only_when_ready() {
        let connector = Arc::new(MockConnector::default());
        let mgr = manager_with(connector, Ok(true));
        let sink = Arc::new(RecordingSink {
            received: Mutex::new(Vec::new()),
        });
        mgr.set_inbound_sink(Arc::clone(&sink) as Arc<dyn InboundSink>)
            .await;
        mgr.initialize("t1").await.unwrap();

        let message = |body: &str| ConnectorEvent::Message {
            token: "t1".into(),
            message_id: "m1".into(),
            chat_jid: "123@c.us".into(),
            sender_jid: "123@c.us".into(),
            body: body.into(),
            is_group: false,
            media_type: None,
        };

        // Not ready yet: dropped.
        mgr.apply_event(message("early")).await;

        mgr.apply_event(ready_event("t1")).await;
        mgr.apply_event(message("hola")).await;

        // The sink runs on a spawned task.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let received = sink.received.lock().await;
        assert_eq!(received.as_slice(), [("t1".to_string(), "hola".to_string())]);
    }
}
