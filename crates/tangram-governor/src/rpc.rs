//! Outbound RPC surface the governor needs from the transport layer.
//!
//! Kept as a trait object so this crate never depends on `tangram-node`
//! (which depends on this crate).

use std::future::Future;
use std::pin::Pin;

use tangram_protocol::PlayerId;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait PeerRpc: Send + Sync {
    /// Pings `peer`, returning the measured round-trip in milliseconds,
    /// or `None` on any RPC failure.
    fn ping(&self, peer: PlayerId) -> BoxFuture<'_, Option<f64>>;

    /// Fetches `peer`'s self-reported average ping, or `None` on failure.
    fn get_latency(&self, peer: PlayerId) -> BoxFuture<'_, Option<f64>>;

    /// Invokes `HostElection` on `peer`. Returns whether the RPC
    /// succeeded -- if any such call succeeds, the caller abandons its
    /// own candidacy.
    fn host_election(&self, peer: PlayerId) -> BoxFuture<'_, bool>;

    /// Invokes `ConnectToMe(host)` on `peer`. Returns whether the RPC
    /// succeeded.
    fn connect_to_me(&self, peer: PlayerId, host: PlayerId) -> BoxFuture<'_, bool>;
}
