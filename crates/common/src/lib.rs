//! Shared types for the charla gateway.
//!
//! Holds the error taxonomy surfaced over HTTP and the message/identifier
//! types exchanged between the connector, the session manager and the
//! auto-reply router.

pub mod error;
pub mod types;

pub use {
    error::Error,
    types::{InboundMessage, contact_jid, group_jid, is_group_jid},
};

/// Result alias used across charla crates.
pub type Result<T> = std::result::Result<T, Error>;
