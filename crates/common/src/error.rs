//! Error taxonomy for session, routing and assistant operations.
//!
//! Collaborator failures are converted into these variants at the boundary;
//! raw transport errors never reach an HTTP response body.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No session exists for the given tenant token.
    #[error("session not initialized for this token")]
    NotInitialized,

    /// The token-validation service rejected the token.
    #[error("token rejected by validation service")]
    InvalidToken,

    /// The token-validation service could not be reached.
    #[error("token validation service unavailable: {0}")]
    ValidationServiceError(String),

    /// Session exists but is not ready; guards every delegated operation.
    #[error("session not logged in")]
    NotLoggedIn,

    /// QR issuance cap reached for this session.
    #[error("maximum QR attempts exceeded")]
    AttemptsExceeded,

    /// The requested resource is not currently present (e.g. no QR pending).
    #[error("not available")]
    NotAvailable,

    /// The assistant automation could not find the expected UI.
    #[error("assistant initialization failed: {0}")]
    InitializationFailed(String),

    /// The assistant polling bound was exhausted without a new response.
    #[error("timed out waiting for assistant response")]
    ResponseTimeout,

    /// Anti-automation warning detected; the session was torn down.
    #[error("assistant throttled the session")]
    Throttled,

    /// Bulk shutdown secret mismatch.
    #[error("forbidden")]
    Forbidden,

    /// No assistant session exists for the given token.
    #[error("assistant session not found")]
    SessionNotFound,

    /// A delegated underlying-connection call failed.
    #[error("upstream error: {0}")]
    UpstreamError(String),

    /// Malformed caller input.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl Error {
    /// HTTP status code reflecting the taxonomy.
    ///
    /// 4xx for caller errors, 401/403 for auth-related failures, 404 for
    /// absent resources, 5xx for upstream and automation failures.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::NotLoggedIn => 400,
            Self::InvalidToken => 401,
            Self::Forbidden => 403,
            Self::NotInitialized | Self::NotAvailable | Self::SessionNotFound => 404,
            Self::AttemptsExceeded => 429,
            Self::InitializationFailed(_) | Self::UpstreamError(_) => 500,
            Self::ValidationServiceError(_) => 502,
            Self::Throttled => 503,
            Self::ResponseTimeout => 504,
        }
    }
}
