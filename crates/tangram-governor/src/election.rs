//! Latency-weighted Bully host election.

use std::sync::Arc;

use tokio::sync::Mutex;

use tangram_protocol::PlayerId;
use tangram_state::GameState;

use crate::directory::PeerDirectory;
use crate::rpc::PeerRpc;

/// Runs the election as initiator `self_id`. Holds both the state lock
/// and the directory lock for the full duration, including the remote
/// calls within it: no tile updates and no latency updates may apply
/// mid-election.
///
/// Returns whether this peer declared itself host.
pub async fn run_election(
    self_id: PlayerId,
    state: &Arc<Mutex<GameState>>,
    directory: &Arc<Mutex<PeerDirectory>>,
    rpc: &(dyn PeerRpc),
) -> bool {
    let mut state_guard = state.lock().await;
    let mut dir_guard = directory.lock().await;

    let other_ids: Vec<PlayerId> = state_guard
        .peers
        .iter()
        .map(|p| p.id)
        .filter(|&id| id != self_id)
        .collect();

    for &peer in &other_ids {
        if let Some(avg) = rpc.get_latency(peer).await {
            dir_guard.record_avg_ping(peer, avg);
        }
    }

    let my_avg = dir_guard.average_of_my_pings();

    for &peer in &other_ids {
        let their_avg = dir_guard.avg_ping_of(peer).unwrap_or(f64::MAX);
        if (their_avg, peer) < (my_avg, self_id) && rpc.host_election(peer).await {
            tracing::debug!(
                candidate = peer,
                "election: deferring to a lower-latency candidate"
            );
            return false;
        }
    }

    state_guard.host = self_id;
    tracing::info!(host = self_id, "election: declared self host");

    for peer in other_ids {
        if !rpc.connect_to_me(peer, self_id).await {
            tracing::debug!(peer, "election: ConnectToMe failed, peer presumed unreachable");
        }
    }

    true
}
