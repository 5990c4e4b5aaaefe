//! Adapters wiring the router's collaborator seams to live components.

use std::sync::Arc;

use async_trait::async_trait;

use {
    charla_assistant::AssistantDriver,
    charla_auto_reply::{AssistantRelay, ReplySender},
    charla_common::Result,
    charla_connector::ClientOp,
    charla_sessions::SessionManager,
};

/// Assistant relay backed by the in-process browser driver.
pub struct LocalAssistantRelay {
    driver: Arc<AssistantDriver>,
}

impl LocalAssistantRelay {
    pub fn new(driver: Arc<AssistantDriver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl AssistantRelay for LocalAssistantRelay {
    async fn init(&self, token: &str) -> Result<()> {
        self.driver.init(token).await.map(|_| ())
    }

    async fn chat(&self, token: &str, message: &str) -> Result<String> {
        self.driver.send_and_receive(token, message).await
    }
}

/// Sends auto-replies through the tenant's own messaging session.
pub struct SessionReplySender {
    sessions: Arc<SessionManager>,
}

impl SessionReplySender {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl ReplySender for SessionReplySender {
    async fn reply(&self, token: &str, chat_id: &str, text: &str) -> Result<()> {
        self.sessions
            .execute(token, ClientOp::SendText {
                to: chat_id.to_string(),
                body: text.to_string(),
            })
            .await
            .map(|_| ())
    }
}
