//! Outbound RPC surface the replication engine needs from the transport
//! layer. Same decoupling pattern as `tangram_governor::PeerRpc`.

use std::future::Future;
use std::pin::Pin;

use tangram_protocol::{PlayerId, TanId};
use tangram_state::{GameState, Peer, Point};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait ReplicationRpc: Send + Sync {
    /// `LockTan`. An RPC error counts as assent: `None` is treated by
    /// the caller the same as an explicit `ok=true`, since an unreachable
    /// peer can't object either.
    fn lock_tan(
        &self,
        peer: PlayerId,
        tile_id: TanId,
        desired_owner: PlayerId,
        time: u64,
    ) -> BoxFuture<'_, Option<bool>>;

    /// `MoveTan`, fire-and-forget: errors are logged by the
    /// caller, never propagated.
    fn move_tan(
        &self,
        peer: PlayerId,
        tile_id: TanId,
        location: Point,
        rotation: u32,
        time: u64,
    ) -> BoxFuture<'_, ()>;

    /// `PushUpdate`, fire-and-forget.
    fn push_update(&self, peer: PlayerId, state: GameState) -> BoxFuture<'_, ()>;

    /// Initiates an outbound `Connect` to a peer newly learned of via
    /// `witnessState`.
    fn connect_to_peer(&self, peer: Peer) -> BoxFuture<'_, ()>;
}
