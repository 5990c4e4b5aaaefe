//! HTTP surface for charla.
//!
//! One route per operation; request bodies carry the tenant token plus
//! operation-specific fields, responses are JSON with a human-readable
//! `message` (and a taxonomy-mapped status on failure).

pub mod error;
pub mod relay;
pub mod routes;
pub mod server;
pub mod validate;

pub use {
    relay::{LocalAssistantRelay, SessionReplySender},
    server::{AppState, build_router, serve},
    validate::HttpTokenValidator,
};
