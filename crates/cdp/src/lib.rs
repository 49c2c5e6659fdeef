//! CDP (Chrome DevTools Protocol) Client
//!
//! Core principle: Single WebSocket connection, multiplexed sessions.
//! No locks in hot path - use message passing instead.
//!
//! Consumers program against [`ProtocolSession`]; [`CDPSession`] is the
//! implementation backed by a live browser target.

pub mod client;
pub mod protocol;
pub mod session;

pub use client::{CDPClient, CDPError, EventCallback, Result, SubscriptionId};
pub use protocol::{CDPEvent, CDPRequest, CDPResponse};
pub use session::{CDPSession, ProtocolSession, EVALUATION_SCRIPT_URL};
