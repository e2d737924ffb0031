//! Tangram Replication -- tile ownership, movement, state witnessing, and
//! the host-anchored broadcast fan-out.
//!
//! No transport code lives here: outbound calls go through the
//! `ReplicationRpc` trait, implemented by `tangram-node`, so this crate
//! has no dependency on the transport layer that depends on it.

pub mod engine;
pub mod rpc;

pub use engine::{determine_owner, ReplicationEngine, SubscriberId};
pub use rpc::{BoxFuture, ReplicationRpc};
