//! Inbound RPC dispatch: turns one `Request` into one `Response`,
//! backed by the replication engine, the peer directory, and the shared
//! state. One handler per RPC method, collapsed onto the unified
//! `Request`/`Response` envelope.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;

use tangram_governor::{run_election, PeerDirectory, PeerRpc};
use tangram_protocol::{
    ConnectRequest, ConnectResponse, ConnectToMeRequest, ConnectToMeResponse, ErrorResponse,
    GetLatencyResponse, GetStateResponse, GetTimeResponse, HostElectionResponse, LockTanRequest,
    LockTanResponse, MoveTanRequest, MoveTanResponse, PingRequest, PingResponse,
    PushUpdateRequest, PushUpdateResponse, Request, Response, RpcErrorKind,
};
use tangram_replication::ReplicationEngine;
use tangram_state::{GameConfig, GameState, Peer, StateError};

/// Turns a local `StateError` into the wire-level `RpcErrorKind` returned
/// to the caller as a distinct error kind.
fn error_kind(err: StateError) -> RpcErrorKind {
    match err {
        StateError::UnknownTan(id) => RpcErrorKind::UnknownTan(id),
        StateError::DuplicatePeer(id) => RpcErrorKind::DuplicatePeer(id),
    }
}

pub struct Dispatcher {
    self_id: tangram_protocol::PlayerId,
    self_peer: Peer,
    state: Arc<Mutex<GameState>>,
    config: Arc<GameConfig>,
    directory: Arc<Mutex<PeerDirectory>>,
    replication: Arc<ReplicationEngine>,
    peer_rpc: Arc<dyn PeerRpc>,
}

impl Dispatcher {
    pub fn new(
        self_id: tangram_protocol::PlayerId,
        self_peer: Peer,
        state: Arc<Mutex<GameState>>,
        config: Arc<GameConfig>,
        directory: Arc<Mutex<PeerDirectory>>,
        replication: Arc<ReplicationEngine>,
        peer_rpc: Arc<dyn PeerRpc>,
    ) -> Self {
        Dispatcher {
            self_id,
            self_peer,
            state,
            config,
            directory,
            replication,
            peer_rpc,
        }
    }

    pub async fn handle(&self, req: Request) -> Response {
        match req {
            Request::Connect(r) => self.handle_connect(r).await,
            Request::Ping(r) => self.handle_ping(r),
            Request::GetTime(_) => self.handle_get_time().await,
            Request::GetState(_) => self.handle_get_state().await,
            Request::LockTan(r) => self.handle_lock_tan(r).await,
            Request::MoveTan(r) => self.handle_move_tan(r).await,
            Request::PushUpdate(r) => self.handle_push_update(r).await,
            Request::GetLatency(_) => self.handle_get_latency().await,
            Request::ConnectToMe(r) => self.handle_connect_to_me(r).await,
            Request::HostElection(_) => self.handle_host_election().await,
        }
    }

    async fn handle_connect(&self, req: ConnectRequest) -> Response {
        let mut guard = self.state.lock().await;
        let caller: Peer = req.player.into();
        if guard.get_peer(caller.id).is_some() {
            return Response::Error(ErrorResponse {
                kind: RpcErrorKind::DuplicatePeer(caller.id),
            });
        }
        guard.peers.push(caller);

        Response::Connect(ConnectResponse {
            state: guard.clone().into(),
            config: (*self.config).clone().into(),
            player: self.self_peer.clone().into(),
        })
    }

    fn handle_ping(&self, _req: PingRequest) -> Response {
        Response::Ping(PingResponse { ok: true })
    }

    async fn handle_get_time(&self) -> Response {
        let origin_ms = self.state.lock().await.origin_time_unix_ms;
        let now_ms = now_unix_ms();
        Response::GetTime(GetTimeResponse {
            since_origin_ms: now_ms - origin_ms,
        })
    }

    async fn handle_get_state(&self) -> Response {
        let snapshot = self.state.lock().await.clone();
        Response::GetState(GetStateResponse {
            state: snapshot.into(),
        })
    }

    async fn handle_lock_tan(&self, req: LockTanRequest) -> Response {
        match self
            .replication
            .lock_tan(req.tan, req.player, req.time)
            .await
        {
            Ok(ok) => Response::LockTan(LockTanResponse { ok }),
            Err(e) => Response::Error(ErrorResponse {
                kind: error_kind(e),
            }),
        }
    }

    async fn handle_move_tan(&self, req: MoveTanRequest) -> Response {
        match self
            .replication
            .move_tan_remote(req.tan, req.location.into(), req.rotation, req.time)
            .await
        {
            Ok(()) => Response::MoveTan(MoveTanResponse { ok: true }),
            Err(e) => Response::Error(ErrorResponse {
                kind: error_kind(e),
            }),
        }
    }

    async fn handle_push_update(&self, req: PushUpdateRequest) -> Response {
        self.replication.push_update(req.state.into()).await;
        Response::PushUpdate(PushUpdateResponse { ok: true })
    }

    async fn handle_get_latency(&self) -> Response {
        let avg_ping_ms = self.directory.lock().await.average_of_my_pings();
        Response::GetLatency(GetLatencyResponse { avg_ping_ms })
    }

    async fn handle_connect_to_me(&self, req: ConnectToMeRequest) -> Response {
        self.state.lock().await.host = req.host;
        Response::ConnectToMe(ConnectToMeResponse { ok: true })
    }

    async fn handle_host_election(&self) -> Response {
        run_election(
            self.self_id,
            &self.state,
            &self.directory,
            self.peer_rpc.as_ref(),
        )
        .await;
        Response::HostElection(HostElectionResponse { ok: true })
    }
}

fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
