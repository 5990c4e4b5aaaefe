//! Per-token assistant sessions and the polling response extractor.

use std::{collections::HashMap, sync::Arc};

use {
    tokio::{
        sync::{Mutex, RwLock},
        time::{Instant, MissedTickBehavior},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use {
    charla_common::{Error, Result},
    charla_config::AssistantConfig,
};

use crate::page::{AssistantPage, PageFactory};

/// Outcome of an `init` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantInit {
    Created,
    Existing,
}

struct AssistantSession {
    page: Box<dyn AssistantPage>,
    last_activity: Mutex<Instant>,
    /// Cancels in-flight polls when the session is destroyed.
    cancel: CancellationToken,
}

/// Owns one browser-driven assistant conversation per external token.
pub struct AssistantDriver {
    sessions: RwLock<HashMap<String, Arc<AssistantSession>>>,
    factory: Arc<dyn PageFactory>,
    config: AssistantConfig,
}

impl AssistantDriver {
    pub fn new(factory: Arc<dyn PageFactory>, config: AssistantConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            factory,
            config,
        }
    }

    pub async fn has_session(&self, token: &str) -> bool {
        self.sessions.read().await.contains_key(token)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Open a session for a token, or report the existing one.
    ///
    /// The input control is probed with bounded retries, reloading the page
    /// between attempts; exhaustion closes the browser again.
    pub async fn init(&self, token: &str) -> Result<AssistantInit> {
        if self.sessions.read().await.contains_key(token) {
            debug!(token, "assistant session already open");
            return Ok(AssistantInit::Existing);
        }

        let page = self.factory.open().await?;

        let mut ready = false;
        for attempt in 1..=self.config.init_attempts {
            if page.input_ready().await {
                ready = true;
                break;
            }
            warn!(token, attempt, "assistant input control not found");
            if attempt < self.config.init_attempts
                && let Err(e) = page.reload().await
            {
                warn!(token, error = %e, "reload between init attempts failed");
            }
        }

        if !ready {
            let _ = page.close().await;
            return Err(Error::InitializationFailed(
                "message input not found after retries".into(),
            ));
        }

        let session = Arc::new(AssistantSession {
            page,
            last_activity: Mutex::new(Instant::now()),
            cancel: CancellationToken::new(),
        });

        {
            let mut sessions = self.sessions.write().await;
            if sessions.contains_key(token) {
                // Lost a concurrent init; drop the extra browser.
                drop(sessions);
                let _ = session.page.close().await;
                return Ok(AssistantInit::Existing);
            }
            sessions.insert(token.to_string(), session);
        }

        info!(token, "assistant session initialized");
        Ok(AssistantInit::Created)
    }

    /// Submit a prompt and extract the next finished response.
    ///
    /// The UI has no completion signal: a response counts as new once the
    /// last assistant-authored element's identity differs from the baseline
    /// observed before submission AND its text is non-empty. Polling is
    /// bounded and cancellable via session destruction.
    pub async fn send_and_receive(&self, token: &str, message: &str) -> Result<String> {
        let session = self
            .sessions
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or(Error::SessionNotFound)?;

        let baseline = session.page.last_reply().await?.map(|r| r.id);

        session.page.submit_prompt(message).await?;
        session
            .page
            .wait_for_echo(self.config.submit_timeout())
            .await?;

        let mut round = 0u32;
        loop {
            if session.cancel.is_cancelled() {
                return Err(Error::SessionNotFound);
            }

            if let Some(reply) = session.page.last_reply().await?
                && Some(&reply.id) != baseline.as_ref()
                && !reply.text.is_empty()
            {
                if self.is_throttled(&reply.text) {
                    warn!(token, "anti-automation warning detected, destroying session");
                    let _ = self.close(token).await;
                    return Err(Error::Throttled);
                }
                *session.last_activity.lock().await = Instant::now();
                debug!(token, rounds = round + 1, "assistant reply extracted");
                return Ok(reply.text);
            }

            round += 1;
            if round >= self.config.max_poll_rounds {
                return Err(Error::ResponseTimeout);
            }

            tokio::select! {
                () = tokio::time::sleep(self.config.poll_interval()) => {},
                () = session.cancel.cancelled() => return Err(Error::SessionNotFound),
            }
        }
    }

    fn is_throttled(&self, text: &str) -> bool {
        self.config
            .throttle_markers
            .iter()
            .any(|marker| text.contains(marker))
    }

    /// Force-close one session.
    pub async fn close(&self, token: &str) -> Result<()> {
        let session = self
            .sessions
            .write()
            .await
            .remove(token)
            .ok_or(Error::SessionNotFound)?;
        session.cancel.cancel();
        if let Err(e) = session.page.close().await {
            warn!(token, error = %e, "assistant page close failed");
        }
        info!(token, "assistant session closed");
        Ok(())
    }

    /// Force-close every session, tolerating individual failures.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<(String, Arc<AssistantSession>)> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().collect()
        };

        let closed = drained.len();
        for (token, session) in drained {
            session.cancel.cancel();
            if let Err(e) = session.page.close().await {
                warn!(token, error = %e, "close failed during close-all");
            }
        }
        info!(closed, "all assistant sessions closed");
        closed
    }

    /// Evict sessions idle longer than the configured timeout.
    pub async fn sweep_once(&self) -> usize {
        let idle_timeout = self.config.idle_timeout();
        let mut stale = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (token, session) in sessions.iter() {
                if session.last_activity.lock().await.elapsed() > idle_timeout {
                    stale.push(token.clone());
                }
            }
        }

        let mut evicted = 0;
        for token in stale {
            info!(token, "closing idle assistant session");
            if self.close(&token).await.is_ok() {
                evicted += 1;
            }
        }
        evicted
    }
}

/// Periodic liveness sweep, independent of any request.
pub fn spawn_idle_sweeper(driver: Arc<AssistantDriver>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(driver.config.sweep_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let evicted = driver.sweep_once().await;
            if evicted > 0 {
                debug!(evicted, "idle sweep evicted sessions");
            }
        }
    })
}
