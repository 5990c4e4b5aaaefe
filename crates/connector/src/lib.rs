//! Underlying messaging connection for charla.
//!
//! Talks to the browser-automation sidecar over a WebSocket using a
//! tagged-JSON protocol: commands flow out (`login`, `logout`, `close`,
//! `invoke`), events flow in (`qr`, `ready`, `auth_failure`, `disconnected`,
//! inbound messages, command results). The [`Connector`] trait is the seam
//! the session manager is written against, so tests can substitute a mock.

pub mod types;
pub mod ws;

use async_trait::async_trait;

use charla_common::Result;

pub use {
    types::{ChatSummary, ClientOp, ConnectorCommand, ConnectorEvent, Contact, MessageRecord, OpOutput},
    ws::{EventCallback, WsConnector, connect_with_retry},
};

/// Operations the session layer performs against one underlying connection.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Begin asynchronous login for a token; QR/ready events follow.
    async fn login(&self, token: &str, auth_dir: Option<String>) -> Result<()>;

    /// Log the account out. Errors are surfaced so the caller can retry.
    async fn logout(&self, token: &str) -> Result<()>;

    /// Force-close the underlying browser resource for a token.
    async fn close(&self, token: &str) -> Result<()>;

    /// Execute a delegated client operation and return its typed output.
    async fn invoke(&self, token: &str, op: ClientOp) -> Result<OpOutput>;
}
