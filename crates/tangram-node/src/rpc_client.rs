//! Outbound RPC client: implements both `PeerRpc` and `ReplicationRpc`
//! so the governor and replication crates can reach remote peers without
//! depending on the transport layer directly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};

use tangram_governor::{BoxFuture as GovernorFuture, PeerRpc};
use tangram_protocol::codec::MessageCodec;
use tangram_protocol::{
    ConnectRequest, ConnectToMeRequest, GetLatencyRequest, HostElectionRequest, LockTanRequest,
    MoveTanRequest, PingRequest, PlayerId, PushUpdateRequest, Request, Response, TanId,
    RPC_TIMEOUT_SECS,
};
use tangram_replication::{BoxFuture as ReplicationFuture, ReplicationRpc};
use tangram_state::{GameState, Peer, Point};

use crate::connection_pool::ConnectionPool;
use crate::quic_transport::QuicTransport;

pub struct NodeRpc {
    self_peer: Peer,
    state: Arc<Mutex<GameState>>,
    pool: ConnectionPool,
    transport: Arc<QuicTransport>,
}

impl NodeRpc {
    pub fn new(
        self_peer: Peer,
        state: Arc<Mutex<GameState>>,
        pool: ConnectionPool,
        transport: Arc<QuicTransport>,
    ) -> Self {
        NodeRpc {
            self_peer,
            state,
            pool,
            transport,
        }
    }

    async fn address_of(&self, peer: PlayerId) -> Option<String> {
        self.state
            .lock()
            .await
            .get_peer(peer)
            .map(|p| p.address.clone())
    }

    /// Opens a bidirectional stream to `peer` at `addr` and exchanges
    /// exactly one request/response pair. Evicts the cached connection
    /// on any failure.
    async fn call(&self, peer: PlayerId, addr: &str, req: Request) -> Option<Response> {
        let attempt = async {
            let conn = self.pool.get_or_dial(peer, addr, &self.transport).await.ok()?;
            let (send, recv) = conn.open_bi().await.ok()?;

            let mut writer = FramedWrite::new(send, MessageCodec::<Request>::default());
            writer.send(req).await.ok()?;
            writer.get_mut().finish().ok()?;

            let mut reader = FramedRead::new(recv, MessageCodec::<Response>::default());
            reader.next().await?.ok()
        };

        match timeout(Duration::from_secs(RPC_TIMEOUT_SECS), attempt).await {
            Ok(Some(resp)) => Some(resp),
            _ => {
                self.pool.evict(peer).await;
                None
            }
        }
    }

    /// Issues a `GetTime` call against `peer`, returning the callee's
    /// self-reported milliseconds since its own `origin_time`. Not part
    /// of `PeerRpc`/`ReplicationRpc` since no other crate needs it.
    pub async fn get_time(&self, peer: PlayerId) -> Option<i64> {
        let addr = self.address_of(peer).await?;
        match self
            .call(peer, &addr, Request::GetTime(tangram_protocol::GetTimeRequest))
            .await
        {
            Some(Response::GetTime(r)) => Some(r.since_origin_ms),
            _ => None,
        }
    }
}

impl PeerRpc for NodeRpc {
    fn ping(&self, peer: PlayerId) -> GovernorFuture<'_, Option<f64>> {
        Box::pin(async move {
            let addr = self.address_of(peer).await?;
            let start = Instant::now();
            let resp = self
                .call(
                    peer,
                    &addr,
                    Request::Ping(PingRequest {
                        caller_id: self.self_peer.id,
                    }),
                )
                .await?;
            match resp {
                Response::Ping(_) => Some(start.elapsed().as_secs_f64() * 1000.0),
                _ => None,
            }
        })
    }

    fn get_latency(&self, peer: PlayerId) -> GovernorFuture<'_, Option<f64>> {
        Box::pin(async move {
            let addr = self.address_of(peer).await?;
            match self.call(peer, &addr, Request::GetLatency(GetLatencyRequest)).await {
                Some(Response::GetLatency(r)) => Some(r.avg_ping_ms),
                _ => None,
            }
        })
    }

    fn host_election(&self, peer: PlayerId) -> GovernorFuture<'_, bool> {
        Box::pin(async move {
            let Some(addr) = self.address_of(peer).await else {
                return false;
            };
            matches!(
                self.call(peer, &addr, Request::HostElection(HostElectionRequest))
                    .await,
                Some(Response::HostElection(_))
            )
        })
    }

    fn connect_to_me(&self, peer: PlayerId, host: PlayerId) -> GovernorFuture<'_, bool> {
        Box::pin(async move {
            let Some(addr) = self.address_of(peer).await else {
                return false;
            };
            matches!(
                self.call(peer, &addr, Request::ConnectToMe(ConnectToMeRequest { host }))
                    .await,
                Some(Response::ConnectToMe(_))
            )
        })
    }
}

impl ReplicationRpc for NodeRpc {
    fn lock_tan(
        &self,
        peer: PlayerId,
        tile_id: TanId,
        desired_owner: PlayerId,
        time: u64,
    ) -> ReplicationFuture<'_, Option<bool>> {
        Box::pin(async move {
            let addr = self.address_of(peer).await?;
            match self
                .call(
                    peer,
                    &addr,
                    Request::LockTan(LockTanRequest {
                        tan: tile_id,
                        player: desired_owner,
                        time,
                    }),
                )
                .await
            {
                Some(Response::LockTan(r)) => Some(r.ok),
                _ => None,
            }
        })
    }

    fn move_tan(
        &self,
        peer: PlayerId,
        tile_id: TanId,
        location: Point,
        rotation: u32,
        time: u64,
    ) -> ReplicationFuture<'_, ()> {
        Box::pin(async move {
            let Some(addr) = self.address_of(peer).await else {
                return;
            };
            let _ = self
                .call(
                    peer,
                    &addr,
                    Request::MoveTan(MoveTanRequest {
                        tan: tile_id,
                        location: location.into(),
                        rotation,
                        time,
                    }),
                )
                .await;
        })
    }

    fn push_update(&self, peer: PlayerId, state: GameState) -> ReplicationFuture<'_, ()> {
        Box::pin(async move {
            let Some(addr) = self.address_of(peer).await else {
                return;
            };
            let _ = self
                .call(
                    peer,
                    &addr,
                    Request::PushUpdate(PushUpdateRequest {
                        state: state.into(),
                    }),
                )
                .await;
        })
    }

    fn connect_to_peer(&self, peer: Peer) -> ReplicationFuture<'_, ()> {
        Box::pin(async move {
            let _ = self
                .call(
                    peer.id,
                    &peer.address,
                    Request::Connect(ConnectRequest {
                        player: self.self_peer.clone().into(),
                    }),
                )
                .await;
        })
    }
}
