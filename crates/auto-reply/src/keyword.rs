//! Keyword-matching collaborator client.

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use {
    charla_common::{Error, Result},
    charla_config::KeywordConfig,
};

/// Outcome of a keyword check.
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordMatch {
    pub valid: bool,
    #[serde(default)]
    pub response: Option<String>,
}

/// Collaborator that matches inbound text against tenant keyword rules.
#[async_trait]
pub trait KeywordMatcher: Send + Sync {
    async fn check(&self, token: &str, message: &str) -> Result<KeywordMatch>;
}

#[derive(Serialize)]
struct KeywordRequest<'a> {
    token: &'a str,
    message: &'a str,
}

/// HTTP implementation of the keyword-matching service.
pub struct HttpKeywordMatcher {
    client: reqwest::Client,
    url: String,
}

impl HttpKeywordMatcher {
    pub fn new(config: &KeywordConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::UpstreamError(format!("keyword client: {e}")))?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl KeywordMatcher for HttpKeywordMatcher {
    async fn check(&self, token: &str, message: &str) -> Result<KeywordMatch> {
        let response = self
            .client
            .post(&self.url)
            .json(&KeywordRequest { token, message })
            .send()
            .await
            .map_err(|e| Error::UpstreamError(format!("keyword service: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::UpstreamError(format!(
                "keyword service returned {}",
                response.status()
            )));
        }

        let matched: KeywordMatch = response
            .json()
            .await
            .map_err(|e| Error::UpstreamError(format!("keyword response: {e}")))?;
        debug!(token, valid = matched.valid, "keyword check complete");
        Ok(matched)
    }
}
