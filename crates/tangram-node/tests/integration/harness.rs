//! Test harness for in-process `tangram-node` integration tests.
//!
//! `TestMesh::spawn` boots N real nodes over loopback QUIC in the same
//! tokio runtime, the first starting its own session, the rest joining
//! it via `Connect`, driving the real transport rather than mocking it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use tangram_governor::{run_membership_loop, PeerDirectory, PeerRpc};
use tangram_node::connection_pool::ConnectionPool;
use tangram_node::quic_transport::QuicTransport;
use tangram_node::rpc_client::NodeRpc;
use tangram_node::rpc_server::Dispatcher;
use tangram_node::time_sync::sync_time_over_connection;
use tangram_node::new_player_id;
use tangram_protocol::{codec::MessageCodec, ConnectRequest, PlayerId, Request, Response};
use tangram_replication::{ReplicationEngine, ReplicationRpc};
use tangram_state::{GameConfig, GameState, Peer, Point, Shape, ShapeKind, Tan, TargetTan};

/// A running in-process peer, with all background tasks spawned.
#[allow(dead_code)]
pub struct TestNode {
    pub self_id: PlayerId,
    pub rpc_addr: std::net::SocketAddr,
    pub state: Arc<Mutex<GameState>>,
    pub directory: Arc<Mutex<PeerDirectory>>,
    pub replication: Arc<ReplicationEngine>,
    pub rpc: Arc<NodeRpc>,
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
    _handles: Vec<tokio::task::JoinHandle<()>>,
}

impl TestNode {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    pub async fn snapshot(&self) -> GameState {
        self.state.lock().await.clone()
    }
}

/// A simple two-tile, two-target puzzle used across scenarios.
pub fn sample_config(host_mode: bool) -> GameConfig {
    let shape = Shape {
        points: vec![Point::new(0, 0), Point::new(10, 0), Point::new(0, 10)],
        fill: "#ff0000".into(),
        stroke: "#000000".into(),
    };
    GameConfig {
        canvas_size: Point::new(800, 600),
        offset: Point::new(0, 0),
        margin: 2,
        initial_tans: vec![
            Tan {
                id: 1,
                shape_kind: ShapeKind::STri,
                geometry: shape.clone(),
                owner: tangram_protocol::NO_PLAYER,
                location: Point::new(100, 100),
                rotation: 0,
                clock: Default::default(),
                matched: false,
            },
            Tan {
                id: 2,
                shape_kind: ShapeKind::STri,
                geometry: shape.clone(),
                owner: tangram_protocol::NO_PLAYER,
                location: Point::new(150, 100),
                rotation: 0,
                clock: Default::default(),
                matched: false,
            },
        ],
        targets: vec![
            TargetTan {
                shape_kind: ShapeKind::STri,
                geometry: shape.clone(),
                location: Point::new(300, 300),
                rotation: 0,
            },
            TargetTan {
                shape_kind: ShapeKind::STri,
                geometry: shape,
                location: Point::new(350, 300),
                rotation: 0,
            },
        ],
        host_mode,
    }
}

fn now_unix_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

async fn spawn_first(config: GameConfig) -> anyhow::Result<TestNode> {
    let self_id = new_player_id();
    let rng = ring::rand::SystemRandom::new();
    let pkcs8 = ring::signature::Ed25519KeyPair::generate_pkcs8(&rng)
        .map_err(|_| anyhow::anyhow!("keypair generation failed"))?;
    let transport = Arc::new(QuicTransport::new("127.0.0.1:0".parse()?, pkcs8.as_ref())?);
    let rpc_addr = transport.endpoint.local_addr()?;

    let self_peer = Peer {
        id: self_id,
        address: rpc_addr.to_string(),
        name: format!("peer-{self_id}"),
    };

    let mut snapshot = GameState::new_local(&config, self_peer.clone(), now_unix_ms());
    if config.host_mode {
        snapshot.host = self_id;
    }

    build_node(self_id, self_peer, config, snapshot, transport, ConnectionPool::new()).await
}

async fn spawn_joining(bootstrap_addr: std::net::SocketAddr) -> anyhow::Result<TestNode> {
    let self_id = new_player_id();
    let rng = ring::rand::SystemRandom::new();
    let pkcs8 = ring::signature::Ed25519KeyPair::generate_pkcs8(&rng)
        .map_err(|_| anyhow::anyhow!("keypair generation failed"))?;
    let transport = Arc::new(QuicTransport::new("127.0.0.1:0".parse()?, pkcs8.as_ref())?);
    let rpc_addr = transport.endpoint.local_addr()?;

    let self_peer = Peer {
        id: self_id,
        address: rpc_addr.to_string(),
        name: format!("peer-{self_id}"),
    };

    let conn = transport.dial(bootstrap_addr).await?;
    let (snapshot, config, bootstrap_id) = connect_to_game(&conn, &self_peer).await?;

    let pool = ConnectionPool::new();
    pool.insert(bootstrap_id, conn).await;

    build_node(self_id, self_peer, config, snapshot, transport, pool).await
}

async fn connect_to_game(
    conn: &quinn::Connection,
    self_peer: &Peer,
) -> anyhow::Result<(GameState, GameConfig, PlayerId)> {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    let (send, recv) = conn.open_bi().await?;
    let mut writer = FramedWrite::new(send, MessageCodec::<Request>::default());
    writer
        .send(Request::Connect(ConnectRequest {
            player: self_peer.clone().into(),
        }))
        .await?;
    writer.get_mut().finish()?;

    let mut reader = FramedRead::new(recv, MessageCodec::<Response>::default());
    let resp = reader
        .next()
        .await
        .ok_or_else(|| anyhow::anyhow!("bootstrap closed stream"))??;

    let (mut snapshot, config, bootstrap_id) = match resp {
        Response::Connect(c) => (
            GameState::from(c.state),
            GameConfig::from(c.config),
            c.player.id,
        ),
        other => return Err(anyhow::anyhow!("unexpected response to Connect: {other:?}")),
    };

    match sync_time_over_connection(conn).await {
        Ok(origin_time) => snapshot.origin_time_unix_ms = origin_time,
        Err(e) => tracing::warn!("time sync against bootstrap peer failed: {e}"),
    }

    Ok((snapshot, config, bootstrap_id))
}

async fn build_node(
    self_id: PlayerId,
    self_peer: Peer,
    config: GameConfig,
    snapshot: GameState,
    transport: Arc<QuicTransport>,
    pool: ConnectionPool,
) -> anyhow::Result<TestNode> {
    let rpc_addr = transport.endpoint.local_addr()?;
    let config = Arc::new(config);
    let state = Arc::new(Mutex::new(snapshot));
    let directory = Arc::new(Mutex::new(PeerDirectory::new()));

    let node_rpc = Arc::new(NodeRpc::new(
        self_peer.clone(),
        state.clone(),
        pool,
        transport.clone(),
    ));
    let peer_rpc: Arc<dyn PeerRpc> = node_rpc.clone();
    let replication_rpc: Arc<dyn ReplicationRpc> = node_rpc.clone();

    let replication = Arc::new(ReplicationEngine::new(
        self_id,
        state.clone(),
        config.clone(),
        replication_rpc,
    ));

    let dispatcher = Arc::new(Dispatcher::new(
        self_id,
        self_peer,
        state.clone(),
        config.clone(),
        directory.clone(),
        replication.clone(),
        peer_rpc.clone(),
    ));

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    let mut handles = Vec::new();

    handles.push(tokio::spawn(run_membership_loop(
        self_id,
        state.clone(),
        directory.clone(),
        peer_rpc.clone(),
        shutdown_tx.subscribe(),
    )));

    handles.push({
        let transport = transport.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move { transport.listen(dispatcher, shutdown_rx).await })
    });

    Ok(TestNode {
        self_id,
        rpc_addr,
        state,
        directory,
        replication,
        rpc: node_rpc,
        shutdown_tx,
        _handles: handles,
    })
}

/// Spins up an N-node mesh: node 0 starts the session, nodes 1..N join
/// it via node 0's RPC address.
pub struct TestMesh {
    pub nodes: Vec<TestNode>,
}

impl TestMesh {
    pub async fn spawn(n: usize, config: GameConfig) -> anyhow::Result<TestMesh> {
        assert!(n >= 1, "a mesh needs at least one node");
        let mut nodes = Vec::with_capacity(n);
        let first = spawn_first(config).await?;
        let bootstrap_addr = first.rpc_addr;
        nodes.push(first);

        for _ in 1..n {
            let joined = spawn_joining(bootstrap_addr).await?;
            nodes.push(joined);
            // Give the handshake a moment to settle before the next join,
            // since each joining peer's Connect response snapshot is only
            // as fresh as the bootstrap's state at that instant.
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        Ok(TestMesh { nodes })
    }

    pub async fn shutdown(self) {
        for node in self.nodes {
            node.shutdown().await;
        }
    }
}

/// Polls `check` until it returns true or `timeout` elapses.
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() > deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
