//! Token-validation collaborator client.

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use {
    charla_common::{Error, Result},
    charla_config::ValidationConfig,
    charla_sessions::TokenValidator,
};

#[derive(Serialize)]
struct ValidationRequest<'a> {
    token: &'a str,
}

#[derive(Deserialize)]
struct ValidationResponse {
    valid: bool,
}

/// HTTP implementation of the token-validation service.
pub struct HttpTokenValidator {
    client: reqwest::Client,
    url: String,
}

impl HttpTokenValidator {
    pub fn new(config: &ValidationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::ValidationServiceError(format!("client setup: {e}")))?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl TokenValidator for HttpTokenValidator {
    async fn validate(&self, token: &str) -> Result<bool> {
        let response = self
            .client
            .post(&self.url)
            .json(&ValidationRequest { token })
            .send()
            .await
            .map_err(|e| Error::ValidationServiceError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::ValidationServiceError(format!(
                "validation service returned {}",
                response.status()
            )));
        }

        let parsed: ValidationResponse = response
            .json()
            .await
            .map_err(|e| Error::ValidationServiceError(format!("malformed response: {e}")))?;
        debug!(token, valid = parsed.valid, "token validated");
        Ok(parsed.valid)
    }
}
