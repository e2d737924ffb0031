//! Tangram Governor -- peer directory, interesting-peer gating,
//! membership/failure detection, and host election.
//!
//! No transport code lives here: outbound calls go through the `PeerRpc`
//! trait, implemented by `tangram-node`, so this crate has no dependency
//! on the transport layer that depends on it.

pub mod directory;
pub mod election;
pub mod interesting;
pub mod membership;
pub mod rpc;

pub use directory::PeerDirectory;
pub use election::run_election;
pub use interesting::interesting_peers;
pub use membership::run_membership_loop;
pub use rpc::{BoxFuture, PeerRpc};
