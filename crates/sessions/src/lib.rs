//! Multi-tenant session registry and lifecycle control.
//!
//! Owns the mapping from tenant token to one live underlying messaging
//! connection. All state transitions flow through a single entry point
//! ([`SessionManager::apply_event`]) driven by the connector's event stream,
//! so ordering and locking invariants live in one place.

pub mod manager;
pub mod qr;

pub use manager::{
    InboundSink, InitOutcome, SessionManager, SessionSnapshot, ShutdownReport, TokenValidator,
    spawn_event_pump,
};
