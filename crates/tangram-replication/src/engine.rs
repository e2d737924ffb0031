//! Replication engine -- outbound obtain/move, remote lock/move handlers,
//! state witnessing, and host-anchored broadcast fan-out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, Mutex};

use tangram_governor::interesting_peers;
use tangram_protocol::{PlayerId, TanId, NO_PLAYER};
use tangram_state::{check_solution, clock::Time, GameConfig, GameState, Point, Tan};

use crate::rpc::ReplicationRpc;

/// Conflict resolution for concurrently contended tiles.
///
/// If the local owner is free, or the two sides are not at the same
/// logical time, the caller wins outright. Otherwise both sides
/// incremented from the same base: the parity of that shared time
/// deterministically picks between the two contending ids, so every
/// peer agrees without further messaging.
pub fn determine_owner(
    owner_local: PlayerId,
    t_local: Time,
    caller_owner: PlayerId,
    t: Time,
) -> PlayerId {
    if owner_local == NO_PLAYER || t_local != t {
        return caller_owner;
    }

    let low = owner_local.min(caller_owner);
    let high = owner_local.max(caller_owner);
    if t_local % 2 == 0 {
        low
    } else {
        high
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Coordinates the outbound and inbound halves of replication: `Obtain`,
/// `Move`, the remote `LockTan`/`MoveTan` handlers, state witnessing, and
/// the host broadcast fan-out.
pub struct ReplicationEngine {
    self_id: PlayerId,
    state: Arc<Mutex<GameState>>,
    config: Arc<GameConfig>,
    rpc: Arc<dyn ReplicationRpc>,
    subscribers: StdMutex<HashMap<SubscriberId, mpsc::Sender<()>>>,
    next_subscriber_id: AtomicU64,
}

impl ReplicationEngine {
    pub fn new(
        self_id: PlayerId,
        state: Arc<Mutex<GameState>>,
        config: Arc<GameConfig>,
        rpc: Arc<dyn ReplicationRpc>,
    ) -> Self {
        ReplicationEngine {
            self_id,
            state,
            config,
            rpc,
            subscribers: StdMutex::new(HashMap::new()),
            next_subscriber_id: AtomicU64::new(0),
        }
    }

    pub fn state_handle(&self) -> Arc<Mutex<GameState>> {
        self.state.clone()
    }

    /// Returns a bounded (depth 1) channel that receives a notification
    /// on every state mutation.
    pub fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        let id = SubscriberId(self.next_subscriber_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().unwrap().insert(id, tx);
        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.lock().unwrap().remove(&id);
    }

    /// Non-blocking fan-out to subscribers, then recompute `solved`
    /// against the current state. A slow subscriber never back-pressures
    /// the engine.
    async fn notify(&self) {
        {
            let subs = self.subscribers.lock().unwrap();
            for tx in subs.values() {
                let _ = tx.try_send(());
            }
        }
        let mut guard = self.state.lock().await;
        check_solution(&self.config, &mut guard);
    }

    // ------------------------------------------------------------------
    // Obtain
    // ------------------------------------------------------------------

    /// Acquires (or, if `release`, relinquishes) exclusive ownership of
    /// a tile. Blocks until every interesting peer has responded.
    pub async fn obtain(&self, tile_id: TanId, release: bool) -> tangram_state::Result<bool> {
        let desired_owner = if release { NO_PLAYER } else { self.self_id };

        let (time, targets) = {
            let mut guard = self.state.lock().await;
            let tan = guard
                .get_tan_mut(tile_id)
                .ok_or(tangram_state::StateError::UnknownTan(tile_id))?;

            if tan.owner != NO_PLAYER && tan.owner != self.self_id {
                return Ok(false);
            }

            let time = tan.clock.increment();
            let all: Vec<PlayerId> = guard.peers.iter().map(|p| p.id).collect();
            let targets = interesting_peers(self.self_id, guard.host, &all);
            (time, targets)
        };

        let mut calls = Vec::with_capacity(targets.len());
        for peer in targets {
            let rpc = self.rpc.clone();
            calls.push(async move { rpc.lock_tan(peer, tile_id, desired_owner, time).await });
        }
        let responses = futures_util::future::join_all(calls).await;

        // An RPC error (None) is treated as assent: unreachable peers
        // can't object, and the failure detector removes them separately.
        let all_ok = responses.into_iter().all(|ok| ok.unwrap_or(true));
        if !all_ok {
            return Ok(false);
        }

        {
            let mut guard = self.state.lock().await;
            if let Some(tan) = guard.get_tan_mut(tile_id) {
                tan.owner = desired_owner;
            }
        }
        self.notify().await;
        self.broadcast_after_mutation().await;

        Ok(true)
    }

    /// Remote `LockTan` handler.
    pub async fn lock_tan(
        &self,
        tile_id: TanId,
        caller_owner: PlayerId,
        t: Time,
    ) -> tangram_state::Result<bool> {
        let ok = {
            let mut guard = self.state.lock().await;
            let tan = guard
                .get_tan_mut(tile_id)
                .ok_or(tangram_state::StateError::UnknownTan(tile_id))?;

            let (owner_local, t_local) = (tan.owner, tan.clock.time());
            if !tan.clock.witness(t) {
                false
            } else {
                tan.owner = determine_owner(owner_local, t_local, caller_owner, t);
                tan.owner == caller_owner
            }
        };
        self.notify().await;
        Ok(ok)
    }

    // ------------------------------------------------------------------
    // Move
    // ------------------------------------------------------------------

    /// Moves a tile this peer owns. Non-blocking towards peers: the
    /// broadcast fans out after the local state change, errors logged
    /// but not surfaced to the caller.
    pub async fn move_tan(
        &self,
        tile_id: TanId,
        location: Point,
        rotation: u32,
    ) -> tangram_state::Result<bool> {
        let (ok, time, targets) = {
            let mut guard = self.state.lock().await;
            let tan = guard
                .get_tan_mut(tile_id)
                .ok_or(tangram_state::StateError::UnknownTan(tile_id))?;

            if tan.owner != self.self_id {
                return Ok(false);
            }

            let time = tan.clock.increment();
            tan.location = location;
            tan.rotation = rotation;

            let all: Vec<PlayerId> = guard.peers.iter().map(|p| p.id).collect();
            let targets = interesting_peers(self.self_id, guard.host, &all);
            (true, time, targets)
        };

        for peer in targets {
            let rpc = self.rpc.clone();
            tokio::spawn(async move {
                rpc.move_tan(peer, tile_id, location, rotation, time).await;
            });
        }

        self.notify().await;
        self.broadcast_after_mutation().await;

        Ok(ok)
    }

    /// Remote `MoveTan` handler. No ownership check on receipt: the
    /// sender is trusted to have already established ownership.
    pub async fn move_tan_remote(
        &self,
        tile_id: TanId,
        location: Point,
        rotation: u32,
        t: Time,
    ) -> tangram_state::Result<()> {
        {
            let mut guard = self.state.lock().await;
            let tan = guard
                .get_tan_mut(tile_id)
                .ok_or(tangram_state::StateError::UnknownTan(tile_id))?;
            if tan.clock.witness(t) {
                tan.location = location;
                tan.rotation = rotation;
            }
        }
        self.notify().await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Witnessing
    // ------------------------------------------------------------------

    /// Merges one remote tile observation. Unknown ids are logged and
    /// ignored rather than erroring: a gossip snapshot may reference
    /// tiles that have not arrived yet only in pathological configs, but
    /// the source tolerates it and so do we.
    pub async fn witness_tan(&self, remote: &Tan) {
        let mut guard = self.state.lock().await;
        let Some(tan) = guard.get_tan_mut(remote.id) else {
            tracing::warn!(tan = remote.id, "witness_tan: unknown tile id, ignoring");
            return;
        };

        let (owner_local, t_local) = (tan.owner, tan.clock.time());
        let accepted = tan.clock.witness(remote.clock.time());
        if accepted {
            tan.location = remote.location;
            tan.rotation = remote.rotation;
            tan.owner = determine_owner(owner_local, t_local, remote.owner, remote.clock.time());
        }
    }

    /// Merges a full remote snapshot: every tile via `witness_tan`, and
    /// every peer not already known is added and dialed if it qualifies
    /// as interesting.
    pub async fn witness_state(&self, remote: GameState) {
        for tan in &remote.tiles {
            self.witness_tan(tan).await;
        }

        let mut newly_known = Vec::new();
        {
            let mut guard = self.state.lock().await;
            guard.host = remote.host;
            for peer in &remote.peers {
                if guard.get_peer(peer.id).is_none() {
                    tracing::info!(peer = peer.id, address = %peer.address, "witness_state: adding peer");
                    guard.peers.push(peer.clone());
                    newly_known.push(peer.clone());
                }
            }
        }

        for peer in newly_known {
            self.rpc.connect_to_peer(peer).await;
        }

        self.notify().await;
    }

    // ------------------------------------------------------------------
    // Host broadcast
    // ------------------------------------------------------------------

    /// Pushes a snapshot of the current state to the right audience for
    /// the current mode:
    ///
    /// - decentralized (`host_mode == false` or `host == NO_PLAYER`):
    ///   every peer fans out to every other peer.
    /// - hosted, self is host: push to every other peer.
    /// - hosted, self is not host: push only to the host, who re-pushes
    ///   on receipt (since applying a `PushUpdate` is itself a local
    ///   mutation that re-enters this method).
    ///
    /// All three reduce to `interesting_peers` against an "effective"
    /// host that is forced to `NO_PLAYER` whenever the config selects
    /// decentralized mode.
    async fn broadcast_after_mutation(&self) {
        let (snapshot, targets) = {
            let guard = self.state.lock().await;
            let effective_host = if self.config.host_mode {
                guard.host
            } else {
                NO_PLAYER
            };
            let all: Vec<PlayerId> = guard.peers.iter().map(|p| p.id).collect();
            let targets = interesting_peers(self.self_id, effective_host, &all);
            (guard.clone(), targets)
        };

        for peer in targets {
            let rpc = self.rpc.clone();
            let snapshot = snapshot.clone();
            tokio::spawn(async move {
                rpc.push_update(peer, snapshot).await;
            });
        }
    }

    /// Applies a `PushUpdate` received from a peer: witness, then
    /// (if we are host) re-broadcast on the sender's behalf.
    pub async fn push_update(&self, remote: GameState) {
        self.witness_state(remote).await;
        self.broadcast_after_mutation().await;
    }
}
