//! Peer directory: latency bookkeeping used by the failure
//! detector and by host election.

use std::collections::HashMap;

use tangram_protocol::PlayerId;

/// Tracks round-trip measurements in both directions: what we've measured
/// of our peers, and what each peer has self-reported of its own peers
/// (fetched during election via `GetLatency`).
#[derive(Debug, Clone, Default)]
pub struct PeerDirectory {
    my_ping: HashMap<PlayerId, f64>,
    avg_ping: HashMap<PlayerId, f64>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        PeerDirectory::default()
    }

    /// Records a freshly measured round-trip to `peer`, in milliseconds.
    pub fn record_ping(&mut self, peer: PlayerId, rtt_ms: f64) {
        self.my_ping.insert(peer, rtt_ms);
    }

    /// Records `peer`'s self-reported average ping (fetched via
    /// `GetLatency` during an election).
    pub fn record_avg_ping(&mut self, peer: PlayerId, avg_ms: f64) {
        self.avg_ping.insert(peer, avg_ms);
    }

    pub fn avg_ping_of(&self, peer: PlayerId) -> Option<f64> {
        self.avg_ping.get(&peer).copied()
    }

    /// Drops all bookkeeping for a peer that has left the session.
    pub fn forget(&mut self, peer: PlayerId) {
        self.my_ping.remove(&peer);
        self.avg_ping.remove(&peer);
    }

    /// Arithmetic mean over our own measured pings, or 0 if we have none.
    pub fn average_of_my_pings(&self) -> f64 {
        if self.my_ping.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.my_ping.values().sum();
        sum / self.my_ping.len() as f64
    }
}
