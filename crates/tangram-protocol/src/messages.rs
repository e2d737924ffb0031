//! Wire types for the RPC surface and their framing envelope.
//!
//! Each RPC opens its own bidirectional QUIC stream; the caller writes a
//! `Request`, the callee writes back exactly one `Response`.

use serde::{Deserialize, Serialize};

use crate::{PlayerId, TanId};

// ============================================================================
// Domain wire types -- independent of the tangram-state crate's in-memory
// representation. tangram-state converts to/from these at the RPC boundary,
// so internal mutation never needs to track the wire schema directly.
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePoint {
    pub x: i32,
    pub y: i32,
}

/// The kind of shape a tan is cut from. Determines the rotational period
/// used by the solved predicate: Cube -> 90, Pgram -> 180,
/// everything else -> 360.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    LTri,
    MTri,
    STri,
    Cube,
    Pgram,
}

impl ShapeKind {
    /// Rotational symmetry period in degrees.
    pub fn rotation_period(self) -> u32 {
        match self {
            ShapeKind::Cube => 90,
            ShapeKind::Pgram => 180,
            ShapeKind::LTri | ShapeKind::MTri | ShapeKind::STri => 360,
        }
    }
}

/// Immutable shape geometry, never mutated after a tan is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireShape {
    pub points: Vec<WirePoint>,
    pub fill: String,
    pub stroke: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WirePeer {
    pub id: PlayerId,
    pub address: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTan {
    pub id: TanId,
    pub shape_kind: ShapeKind,
    pub geometry: WireShape,
    pub owner: PlayerId,
    pub location: WirePoint,
    pub rotation: u32,
    pub clock: u64,
    pub matched: bool,
}

/// A target tile from the silhouette: no id/owner/clock, only shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTargetTan {
    pub shape_kind: ShapeKind,
    pub geometry: WireShape,
    pub location: WirePoint,
    pub rotation: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireGameState {
    pub tiles: Vec<WireTan>,
    pub peers: Vec<WirePeer>,
    pub host: PlayerId,
    /// Milliseconds since the Unix epoch at which this session's origin
    /// time sits.
    pub origin_time_unix_ms: i64,
    pub solved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireGameConfig {
    pub canvas_size: WirePoint,
    pub offset: WirePoint,
    pub margin: i32,
    pub initial_tans: Vec<WireTan>,
    pub targets: Vec<WireTargetTan>,
    pub host_mode: bool,
}

// ============================================================================
// RPC error kinds
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum RpcErrorKind {
    #[error("unknown tan id {0}")]
    UnknownTan(TanId),
    #[error("peer id {0} already connected")]
    DuplicatePeer(PlayerId),
}

// ============================================================================
// Request / Response envelope -- one variant per RPC method
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    Connect(ConnectRequest),
    Ping(PingRequest),
    GetTime(GetTimeRequest),
    GetState(GetStateRequest),
    LockTan(LockTanRequest),
    MoveTan(MoveTanRequest),
    PushUpdate(PushUpdateRequest),
    GetLatency(GetLatencyRequest),
    ConnectToMe(ConnectToMeRequest),
    HostElection(HostElectionRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Connect(ConnectResponse),
    Ping(PingResponse),
    GetTime(GetTimeResponse),
    GetState(GetStateResponse),
    LockTan(LockTanResponse),
    MoveTan(MoveTanResponse),
    PushUpdate(PushUpdateResponse),
    GetLatency(GetLatencyResponse),
    ConnectToMe(ConnectToMeResponse),
    HostElection(HostElectionResponse),
    Error(ErrorResponse),
}

impl Response {
    /// Name of the variant, for error messages when a caller receives an
    /// unexpected response shape.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Response::Connect(_) => "Connect",
            Response::Ping(_) => "Ping",
            Response::GetTime(_) => "GetTime",
            Response::GetState(_) => "GetState",
            Response::LockTan(_) => "LockTan",
            Response::MoveTan(_) => "MoveTan",
            Response::PushUpdate(_) => "PushUpdate",
            Response::GetLatency(_) => "GetLatency",
            Response::ConnectToMe(_) => "ConnectToMe",
            Response::HostElection(_) => "HostElection",
            Response::Error(_) => "Error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: RpcErrorKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub player: WirePeer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub state: WireGameState,
    pub config: WireGameConfig,
    /// The callee's own peer record.
    pub player: WirePeer,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PingRequest {
    pub caller_id: PlayerId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PingResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GetTimeRequest;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GetTimeResponse {
    /// Milliseconds since the callee's `origin_time`.
    pub since_origin_ms: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GetStateRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetStateResponse {
    pub state: WireGameState,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LockTanRequest {
    pub tan: TanId,
    pub player: PlayerId,
    pub time: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LockTanResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MoveTanRequest {
    pub tan: TanId,
    pub location: WirePoint,
    pub rotation: u32,
    pub time: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MoveTanResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushUpdateRequest {
    pub state: WireGameState,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PushUpdateResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GetLatencyRequest;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GetLatencyResponse {
    /// Caller's self-reported average ping, in milliseconds.
    pub avg_ping_ms: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConnectToMeRequest {
    pub host: PlayerId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConnectToMeResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HostElectionRequest;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HostElectionResponse {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_response_roundtrip() {
        let req = Request::LockTan(LockTanRequest {
            tan: 7,
            player: 2,
            time: 5,
        });
        let json = serde_json::to_string(&req).unwrap();
        let decoded: Request = serde_json::from_str(&json).unwrap();
        match decoded {
            Request::LockTan(l) => {
                assert_eq!(l.tan, 7);
                assert_eq!(l.player, 2);
                assert_eq!(l.time, 5);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_shape_kind_rotation_period() {
        assert_eq!(ShapeKind::Cube.rotation_period(), 90);
        assert_eq!(ShapeKind::Pgram.rotation_period(), 180);
        assert_eq!(ShapeKind::LTri.rotation_period(), 360);
        assert_eq!(ShapeKind::MTri.rotation_period(), 360);
        assert_eq!(ShapeKind::STri.rotation_period(), 360);
    }

    #[test]
    fn test_error_response_roundtrip() {
        let resp = Response::Error(ErrorResponse {
            kind: RpcErrorKind::UnknownTan(42),
        });
        let json = serde_json::to_string(&resp).unwrap();
        let decoded: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.variant_name(), "Error");
    }

    #[test]
    fn test_all_request_variants_serialize() {
        let reqs = vec![
            Request::Ping(PingRequest { caller_id: 1 }),
            Request::GetTime(GetTimeRequest),
            Request::GetState(GetStateRequest),
            Request::GetLatency(GetLatencyRequest),
            Request::HostElection(HostElectionRequest),
            Request::ConnectToMe(ConnectToMeRequest { host: 3 }),
        ];
        for req in &reqs {
            let json = serde_json::to_string(req).unwrap();
            let _: Request = serde_json::from_str(&json).unwrap();
        }
    }
}
