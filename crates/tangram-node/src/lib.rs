//! Tangram Node -- library crate backing the `tangram-node` binary.
//!
//! Re-exports the connection pool, transport, RPC dispatch/client, time
//! sync, and config modules so integration tests and `main.rs` can reach
//! them directly.

pub mod config;
pub mod connection_pool;
pub mod quic_transport;
pub mod rpc_client;
pub mod rpc_server;
pub mod time_sync;

use std::path::PathBuf;

/// Expand a leading `~/` to `$HOME`.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Generates a random `PlayerId`, grounded on the original's
/// `newPlayer`'s `rand.Uint32()` seed (widened to `i64` and masked
/// positive, since `NO_PLAYER` reserves -1).
pub fn new_player_id() -> tangram_protocol::PlayerId {
    use rand::Rng;
    rand::thread_rng().gen_range(0..i64::MAX)
}
