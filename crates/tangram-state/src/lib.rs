//! Tangram State -- the replicated data model, its per-tile logical
//! clock, and the puzzle-solved predicate.
//!
//! Everything here is pure data plus pure functions; no networking, no
//! locking. `tangram-replication` owns the mutation and tie-break policy
//! that acts on these types.

pub mod clock;
pub mod model;
pub mod solved;
pub mod wire;

pub use clock::{Clock, Time};
pub use model::{GameConfig, GameState, Peer, Point, Shape, Tan, TargetTan};
pub use solved::check_solution;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("unknown tan id {0}")]
    UnknownTan(tangram_protocol::TanId),
    #[error("peer id {0} already connected")]
    DuplicatePeer(tangram_protocol::PlayerId),
}

pub type Result<T> = std::result::Result<T, StateError>;
