//! Membership and failure detection: a 5-second heartbeat
//! loop that pings every interesting peer concurrently, drops the ones
//! that fail, and triggers an election if the dropped peer was host.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use tangram_protocol::{PlayerId, HEARTBEAT_INTERVAL_SECS, NO_PLAYER};
use tangram_state::GameState;

use crate::directory::PeerDirectory;
use crate::election::run_election;
use crate::interesting::interesting_peers;
use crate::rpc::PeerRpc;

/// Runs until `shutdown` fires. Grounded on the governor background
/// task's `tokio::select!` tick loop, stripped of churn/promotion.
pub async fn run_membership_loop(
    self_id: PlayerId,
    state: Arc<Mutex<GameState>>,
    directory: Arc<Mutex<PeerDirectory>>,
    rpc: Arc<dyn PeerRpc>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    let interval = Duration::from_secs(HEARTBEAT_INTERVAL_SECS);

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.recv() => {
                tracing::info!("membership loop shutting down");
                return;
            }
        }

        let (host, targets) = {
            let guard = state.lock().await;
            let all: Vec<PlayerId> = guard.peers.iter().map(|p| p.id).collect();
            (guard.host, interesting_peers(self_id, guard.host, &all))
        };

        let mut pings = Vec::with_capacity(targets.len());
        for peer in targets {
            let rpc = rpc.clone();
            pings.push(async move { (peer, rpc.ping(peer).await) });
        }
        let results = futures_util::future::join_all(pings).await;

        let mut host_lost = false;
        for (peer, rtt) in results {
            match rtt {
                Some(ms) => {
                    directory.lock().await.record_ping(peer, ms);
                }
                None => {
                    tracing::warn!(peer, "membership: heartbeat failed, dropping peer");
                    let mut guard = state.lock().await;
                    guard.remove_peer(peer);
                    directory.lock().await.forget(peer);
                    if peer == host {
                        host_lost = true;
                    }
                }
            }
        }

        if host_lost {
            tracing::info!("membership: host lost, initiating election");
            run_election(self_id, &state, &directory, rpc.as_ref()).await;
        } else if host == NO_PLAYER {
            // Decentralized mode never elects on its own; hosted mode
            // with no host yet (startup race) does not retry here --
            // an explicit user request or the next failed heartbeat
            // against a stale host id will trigger it instead.
        }
    }
}
