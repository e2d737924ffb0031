//! Who a peer must maintain a direct channel to.

use tangram_protocol::{PlayerId, NO_PLAYER};

/// Returns the subset of `all_peers` (excluding `self_id`) that `self_id`
/// must talk to directly, given the current `host`.
///
/// | Mode | Who this peer must talk to |
/// |---|---|
/// | decentralized (`host == NO_PLAYER`) | all known peers |
/// | hosted, I am host | all known peers |
/// | hosted, I am not host | `{host}` only |
pub fn interesting_peers(self_id: PlayerId, host: PlayerId, all_peers: &[PlayerId]) -> Vec<PlayerId> {
    if host == NO_PLAYER || host == self_id {
        all_peers.iter().copied().filter(|&p| p != self_id).collect()
    } else {
        vec![host]
    }
}
