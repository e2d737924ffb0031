//! Replicated data model: tiles, peers, config, and the shared
//! game state every peer holds a full copy of.

use serde::{Deserialize, Serialize};
use tangram_protocol::{PlayerId, ShapeKind, TanId, NO_PLAYER};

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }

    pub fn add(self, other: Point) -> Point {
        Point {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    /// Chebyshev distance to `other`.
    pub fn chebyshev_distance(self, other: Point) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// Immutable shape geometry, shared by a tile and its target silhouette
/// counterpart. Never mutated after a session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub points: Vec<Point>,
    pub fill: String,
    pub stroke: String,
}

/// A single geometric tile in play.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tan {
    pub id: TanId,
    pub shape_kind: ShapeKind,
    pub geometry: Shape,
    pub owner: PlayerId,
    pub location: Point,
    pub rotation: u32,
    pub clock: Clock,
    pub matched: bool,
}

/// A target tile from the silhouette the players are assembling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetTan {
    pub shape_kind: ShapeKind,
    pub geometry: Shape,
    pub location: Point,
    pub rotation: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    pub id: PlayerId,
    pub address: String,
    pub name: String,
}

/// Immutable-after-load starting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub canvas_size: Point,
    pub offset: Point,
    pub margin: i32,
    pub initial_tans: Vec<Tan>,
    pub targets: Vec<TargetTan>,
    /// Selects hosted (broadcast-via-host) vs. fully decentralized fan-out.
    pub host_mode: bool,
}

/// The full replicated state every peer holds a copy of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub tiles: Vec<Tan>,
    pub peers: Vec<Peer>,
    pub host: PlayerId,
    /// Milliseconds since the Unix epoch marking this session's time
    /// origin. Overwritten wholesale by time sync, never
    /// smoothed.
    pub origin_time_unix_ms: i64,
    pub solved: bool,
}

impl GameState {
    /// Builds the initial state for a peer starting its own session
    /// (`NewGame`): tiles taken from config with no owner, self as the
    /// sole peer.
    pub fn new_local(config: &GameConfig, me: Peer, origin_time_unix_ms: i64) -> GameState {
        let tiles = config
            .initial_tans
            .iter()
            .cloned()
            .map(|mut tan| {
                tan.owner = NO_PLAYER;
                tan
            })
            .collect();

        GameState {
            tiles,
            peers: vec![me],
            host: NO_PLAYER,
            origin_time_unix_ms,
            solved: false,
        }
    }

    pub fn get_tan(&self, id: TanId) -> Option<&Tan> {
        self.tiles.iter().find(|t| t.id == id)
    }

    pub fn get_tan_mut(&mut self, id: TanId) -> Option<&mut Tan> {
        self.tiles.iter_mut().find(|t| t.id == id)
    }

    pub fn get_peer(&self, id: PlayerId) -> Option<&Peer> {
        self.peers.iter().find(|p| p.id == id)
    }

    /// Removes a peer by id, preserving the order of the rest, the same
    /// way `dropPlayer` does.
    pub fn remove_peer(&mut self, id: PlayerId) -> bool {
        if let Some(index) = self.peers.iter().position(|p| p.id == id) {
            self.peers.remove(index);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_shape() -> Shape {
        Shape {
            points: vec![Point::new(0, 0), Point::new(1, 0), Point::new(0, 1)],
            fill: "red".into(),
            stroke: "black".into(),
        }
    }

    fn sample_config() -> GameConfig {
        GameConfig {
            canvas_size: Point::new(800, 600),
            offset: Point::new(0, 0),
            margin: 5,
            initial_tans: vec![Tan {
                id: 1,
                shape_kind: ShapeKind::LTri,
                geometry: sample_shape(),
                owner: 99,
                location: Point::new(10, 10),
                rotation: 0,
                clock: Clock::new(),
                matched: false,
            }],
            targets: vec![],
            host_mode: true,
        }
    }

    #[test]
    fn test_new_local_resets_owner_to_no_player() {
        let config = sample_config();
        let me = Peer {
            id: 1,
            address: "127.0.0.1:9000".into(),
            name: "alice".into(),
        };
        let state = GameState::new_local(&config, me, 0);
        assert_eq!(state.tiles[0].owner, NO_PLAYER);
        assert_eq!(state.peers.len(), 1);
        assert_eq!(state.host, NO_PLAYER);
    }

    #[test]
    fn test_get_tan_and_mut() {
        let config = sample_config();
        let me = Peer {
            id: 1,
            address: "a".into(),
            name: "alice".into(),
        };
        let mut state = GameState::new_local(&config, me, 0);
        assert!(state.get_tan(1).is_some());
        assert!(state.get_tan(2).is_none());
        state.get_tan_mut(1).unwrap().rotation = 45;
        assert_eq!(state.get_tan(1).unwrap().rotation, 45);
    }

    #[test]
    fn test_remove_peer_compacts() {
        let config = sample_config();
        let me = Peer {
            id: 1,
            address: "a".into(),
            name: "alice".into(),
        };
        let mut state = GameState::new_local(&config, me, 0);
        state.peers.push(Peer {
            id: 2,
            address: "b".into(),
            name: "bob".into(),
        });
        assert!(state.remove_peer(1));
        assert_eq!(state.peers.len(), 1);
        assert_eq!(state.peers[0].id, 2);
        assert!(!state.remove_peer(42));
    }

    #[test]
    fn test_chebyshev_distance() {
        let a = Point::new(0, 0);
        let b = Point::new(3, -5);
        assert_eq!(a.chebyshev_distance(b), 5);
    }
}
