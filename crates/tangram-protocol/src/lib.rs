//! Tangram Protocol -- wire types, RPC message codec, transport constants.
//!
//! QUIC between peers. Each RPC opens its own bidirectional stream, writes a
//! `Request`, reads back a `Response`.
//! 4-byte big-endian length prefix + serde JSON.

pub mod codec;
pub mod era;
pub mod messages;
pub mod tls;

pub use codec::MessageCodec;
pub use era::{ProtocolEra, CURRENT_ERA, ERA_0};
pub use messages::*;

/// Heartbeat period: default 5 seconds.
pub const HEARTBEAT_INTERVAL_SECS: u64 = ERA_0.heartbeat_interval_secs;

/// QUIC idle timeout in seconds (sourced from current era).
pub const QUIC_IDLE_TIMEOUT_SECS: u64 = ERA_0.quic_idle_timeout_secs;

/// RPC deadline in seconds -- every outbound call races this timeout.
pub const RPC_TIMEOUT_SECS: u64 = ERA_0.rpc_timeout_secs;

/// Player identity. A stable, totally-ordered integer.
///
/// `NO_PLAYER` is the reserved sentinel denoting "unowned"/"hostless".
pub type PlayerId = i64;

/// Reserved value meaning "no player": an unowned tan, or a hostless game.
pub const NO_PLAYER: PlayerId = -1;

/// Tan (tile) identifier, unique within one session.
pub type TanId = u32;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
    #[error("codec error: {0}")]
    Codec(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected response variant: expected {expected}, got {got}")]
    UnexpectedResponse { expected: &'static str, got: String },
}
