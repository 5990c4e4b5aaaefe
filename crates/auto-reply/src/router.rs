//! Inbound message router.

use std::sync::Arc;

use {
    async_trait::async_trait,
    tracing::{debug, warn},
};

use {
    charla_common::{InboundMessage, Result},
    charla_config::{AutoReplyConfig, FailurePolicy},
    charla_sessions::InboundSink,
};

use crate::keyword::KeywordMatcher;

/// Chat-assistant operations the router needs: ensure a session, then ask.
#[async_trait]
pub trait AssistantRelay: Send + Sync {
    async fn init(&self, token: &str) -> Result<()>;
    async fn chat(&self, token: &str, message: &str) -> Result<String>;
}

/// Sends a reply back into the chat a message originated from.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn reply(&self, token: &str, chat_id: &str, text: &str) -> Result<()>;
}

/// Routes inbound messages to the assistant or the keyword matcher.
pub struct AutoReplyRouter {
    assistant: Arc<dyn AssistantRelay>,
    keyword: Arc<dyn KeywordMatcher>,
    replies: Arc<dyn ReplySender>,
    config: AutoReplyConfig,
}

impl AutoReplyRouter {
    pub fn new(
        assistant: Arc<dyn AssistantRelay>,
        keyword: Arc<dyn KeywordMatcher>,
        replies: Arc<dyn ReplySender>,
        config: AutoReplyConfig,
    ) -> Self {
        Self {
            assistant,
            keyword,
            replies,
            config,
        }
    }

    /// Route one inbound message. Failures abort the reply for this message
    /// only; they never affect the session.
    pub async fn route(&self, token: &str, message: &InboundMessage) {
        // Group conversations and media are outside automatic-reply scope.
        if message.is_group || message.has_media() {
            debug!(token, chat = %message.chat_id, "ignoring group or media message");
            return;
        }

        if let Some(prompt) = message.body.strip_prefix(&self.config.assistant_prefix) {
            self.route_to_assistant(token, &message.chat_id, prompt)
                .await;
            return;
        }

        self.route_to_keyword(token, message).await;
    }

    /// Init must precede chat; each call carries its own timeout.
    async fn route_to_assistant(&self, token: &str, chat_id: &str, prompt: &str) {
        let outcome = async {
            tokio::time::timeout(self.config.init_timeout(), self.assistant.init(token))
                .await
                .map_err(|_| charla_common::Error::ResponseTimeout)??;
            tokio::time::timeout(
                self.config.chat_timeout(),
                self.assistant.chat(token, prompt),
            )
            .await
            .map_err(|_| charla_common::Error::ResponseTimeout)?
        }
        .await;

        match outcome {
            Ok(text) => {
                if let Err(e) = self.replies.reply(token, chat_id, &text).await {
                    warn!(token, chat_id, error = %e, "failed to deliver assistant reply");
                }
            },
            Err(e) => {
                warn!(token, chat_id, error = %e, "assistant flow failed");
                if self.config.failure_policy == FailurePolicy::Apology
                    && let Err(e) = self
                        .replies
                        .reply(token, chat_id, &self.config.apology_text)
                        .await
                {
                    warn!(token, chat_id, error = %e, "failed to deliver apology");
                }
            },
        }
    }

    async fn route_to_keyword(&self, token: &str, message: &InboundMessage) {
        match self.keyword.check(token, &message.body).await {
            Ok(matched) if matched.valid => {
                let Some(text) = matched.response else {
                    debug!(token, "keyword match without response text");
                    return;
                };
                if let Err(e) = self.replies.reply(token, &message.chat_id, &text).await {
                    warn!(token, chat = %message.chat_id, error = %e, "failed to deliver keyword reply");
                }
            },
            Ok(_) => {},
            Err(e) => {
                warn!(token, error = %e, "keyword check failed");
            },
        }
    }
}

#[async_trait]
impl InboundSink for AutoReplyRouter {
    async fn handle(&self, token: &str, message: InboundMessage) {
        self.route(token, &message).await;
    }
}
