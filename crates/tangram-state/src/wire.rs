//! Conversions between the in-memory domain model and the wire types
//! `tangram-protocol` sends over RPC. The wire shape and the domain shape
//! evolve independently; these impls are the only place they meet.

use tangram_protocol::{WireGameConfig, WireGameState, WirePeer, WirePoint, WireShape, WireTan, WireTargetTan};

use crate::model::{GameConfig, GameState, Peer, Point, Shape, Tan, TargetTan};

impl From<Point> for WirePoint {
    fn from(p: Point) -> Self {
        WirePoint { x: p.x, y: p.y }
    }
}

impl From<WirePoint> for Point {
    fn from(p: WirePoint) -> Self {
        Point { x: p.x, y: p.y }
    }
}

impl From<Shape> for WireShape {
    fn from(s: Shape) -> Self {
        WireShape {
            points: s.points.into_iter().map(Into::into).collect(),
            fill: s.fill,
            stroke: s.stroke,
        }
    }
}

impl From<WireShape> for Shape {
    fn from(s: WireShape) -> Self {
        Shape {
            points: s.points.into_iter().map(Into::into).collect(),
            fill: s.fill,
            stroke: s.stroke,
        }
    }
}

impl From<Peer> for WirePeer {
    fn from(p: Peer) -> Self {
        WirePeer {
            id: p.id,
            address: p.address,
            name: p.name,
        }
    }
}

impl From<WirePeer> for Peer {
    fn from(p: WirePeer) -> Self {
        Peer {
            id: p.id,
            address: p.address,
            name: p.name,
        }
    }
}

impl From<Tan> for WireTan {
    fn from(t: Tan) -> Self {
        WireTan {
            id: t.id,
            shape_kind: t.shape_kind,
            geometry: t.geometry.into(),
            owner: t.owner,
            location: t.location.into(),
            rotation: t.rotation,
            clock: t.clock.time(),
            matched: t.matched,
        }
    }
}

impl From<WireTan> for Tan {
    fn from(t: WireTan) -> Self {
        let mut clock = crate::clock::Clock::new();
        clock.witness(t.clock);
        Tan {
            id: t.id,
            shape_kind: t.shape_kind,
            geometry: t.geometry.into(),
            owner: t.owner,
            location: t.location.into(),
            rotation: t.rotation,
            clock,
            matched: t.matched,
        }
    }
}

impl From<TargetTan> for WireTargetTan {
    fn from(t: TargetTan) -> Self {
        WireTargetTan {
            shape_kind: t.shape_kind,
            geometry: t.geometry.into(),
            location: t.location.into(),
            rotation: t.rotation,
        }
    }
}

impl From<WireTargetTan> for TargetTan {
    fn from(t: WireTargetTan) -> Self {
        TargetTan {
            shape_kind: t.shape_kind,
            geometry: t.geometry.into(),
            location: t.location.into(),
            rotation: t.rotation,
        }
    }
}

impl From<GameState> for WireGameState {
    fn from(s: GameState) -> Self {
        WireGameState {
            tiles: s.tiles.into_iter().map(Into::into).collect(),
            peers: s.peers.into_iter().map(Into::into).collect(),
            host: s.host,
            origin_time_unix_ms: s.origin_time_unix_ms,
            solved: s.solved,
        }
    }
}

impl From<WireGameState> for GameState {
    fn from(s: WireGameState) -> Self {
        GameState {
            tiles: s.tiles.into_iter().map(Into::into).collect(),
            peers: s.peers.into_iter().map(Into::into).collect(),
            host: s.host,
            origin_time_unix_ms: s.origin_time_unix_ms,
            solved: s.solved,
        }
    }
}

impl From<GameConfig> for WireGameConfig {
    fn from(c: GameConfig) -> Self {
        WireGameConfig {
            canvas_size: c.canvas_size.into(),
            offset: c.offset.into(),
            margin: c.margin,
            initial_tans: c.initial_tans.into_iter().map(Into::into).collect(),
            targets: c.targets.into_iter().map(Into::into).collect(),
            host_mode: c.host_mode,
        }
    }
}

impl From<WireGameConfig> for GameConfig {
    fn from(c: WireGameConfig) -> Self {
        GameConfig {
            canvas_size: c.canvas_size.into(),
            offset: c.offset.into(),
            margin: c.margin,
            initial_tans: c.initial_tans.into_iter().map(Into::into).collect(),
            targets: c.targets.into_iter().map(Into::into).collect(),
            host_mode: c.host_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use tangram_protocol::ShapeKind;

    #[test]
    fn test_tan_wire_roundtrip_preserves_clock_value() {
        let mut clock = Clock::new();
        clock.increment();
        clock.increment();
        let tan = Tan {
            id: 3,
            shape_kind: ShapeKind::Cube,
            geometry: Shape {
                points: vec![Point::new(0, 0)],
                fill: "blue".into(),
                stroke: "black".into(),
            },
            owner: 1,
            location: Point::new(5, 5),
            rotation: 90,
            clock,
            matched: true,
        };
        let wire: WireTan = tan.clone().into();
        assert_eq!(wire.clock, 2);
        let back: Tan = wire.into();
        assert_eq!(back.clock.time(), 2);
        assert_eq!(back.id, tan.id);
    }
}
