//! Protocol era -- the timing and transport parameters every peer in a
//! session agrees on implicitly (there is no negotiation; a session is
//! short-lived enough that one hardcoded era suffices).

/// A named, versioned set of timing and transport parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolEra {
    pub id: u16,

    /// Heartbeat ping period. Default 5 seconds.
    pub heartbeat_interval_secs: u64,

    /// Deadline for any single outbound RPC.
    pub rpc_timeout_secs: u64,

    /// QUIC idle timeout; must exceed `heartbeat_interval_secs`.
    pub quic_idle_timeout_secs: u64,

    /// Maximum wire message size in bytes. A full `GameState` snapshot must
    /// fit comfortably within this for `PushUpdate`/`Connect` responses.
    pub max_message_bytes: usize,
}

/// Era 0: the only era this implementation speaks.
pub const ERA_0: ProtocolEra = ProtocolEra {
    id: 0,
    heartbeat_interval_secs: 5,
    rpc_timeout_secs: 5,
    quic_idle_timeout_secs: 60,
    max_message_bytes: 8 * 1024 * 1024,
};

/// The current active era.
pub const CURRENT_ERA: &ProtocolEra = &ERA_0;
