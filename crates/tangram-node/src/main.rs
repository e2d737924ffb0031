//! Tangram Node -- single binary peer in a replicated tangram puzzle
//! session.
//!
//! Usage:
//!   tangram-node run --game-config puzzle.json      # start a new session
//!   tangram-node run --bootstrap 203.0.113.5:9470    # join an existing one
//!   tangram-node status                              # query a running peer

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use tangram_api::{router, GatewayState};
use tangram_governor::{run_membership_loop, PeerDirectory, PeerRpc};
use tangram_node::config::{load_game_config, NodeConfig};
use tangram_node::connection_pool::ConnectionPool;
use tangram_node::quic_transport::QuicTransport;
use tangram_node::rpc_client::NodeRpc;
use tangram_node::rpc_server::Dispatcher;
use tangram_node::time_sync::sync_time_over_connection;
use tangram_node::{expand_tilde, new_player_id};
use tangram_protocol::{PlayerId, Request};
use tangram_replication::{ReplicationEngine, ReplicationRpc};
use tangram_state::{GameConfig, GameState, Peer};

#[derive(Parser)]
#[command(
    name = "tangram-node",
    about = "Tangram-Sync peer: replicated tangram puzzle workspace"
)]
struct Cli {
    /// Path to the node's own config file.
    #[arg(long, default_value = "~/.tangram/config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node (default).
    Run {
        /// Address the UI websocket gateway binds to.
        #[arg(long)]
        gateway_addr: Option<String>,

        /// Address this peer's RPC/QUIC endpoint binds to.
        #[arg(long)]
        rpc_addr: Option<String>,

        /// Remote peer's RPC address to join. Omit to start a new session.
        #[arg(long)]
        bootstrap: Option<String>,

        /// Path to the `GameConfig` JSON document (ignored when joining).
        #[arg(long)]
        game_config: Option<String>,

        /// Display name advertised to other peers.
        #[arg(long)]
        name: Option<String>,
    },
    /// Connect to this peer's own gateway and print its current state.
    Status,
}

fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tangram_node=info,tangram_api=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let node_cfg = NodeConfig::load_or_default(&config_path)?;

    match cli.command {
        None => run_node(node_cfg).await,
        Some(Commands::Run {
            gateway_addr,
            rpc_addr,
            bootstrap,
            game_config,
            name,
        }) => {
            let mut node_cfg = node_cfg;
            if let Some(addr) = gateway_addr {
                node_cfg.node.gateway_addr = addr;
            }
            if let Some(addr) = rpc_addr {
                node_cfg.node.rpc_addr = addr;
            }
            if let Some(addr) = bootstrap {
                node_cfg.node.bootstrap_addr = Some(addr);
            }
            if let Some(path) = game_config {
                node_cfg.node.game_config = path;
            }
            if let Some(name) = name {
                node_cfg.node.name = name;
            }
            run_node(node_cfg).await
        }
        Some(Commands::Status) => print_status(&node_cfg).await,
    }
}

/// Opens a short-lived websocket connection to a running peer's own
/// gateway and prints the first player/config/state frames it sends.
async fn print_status(cfg: &NodeConfig) -> anyhow::Result<()> {
    let url = format!("ws://{}/ws", cfg.node.gateway_addr);
    let (mut socket, _) = tokio_tungstenite::connect_async(&url).await?;

    let mut seen = 0;
    while seen < 3 {
        match socket.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
                    println!("{}", serde_json::to_string_pretty(&value)?);
                } else {
                    println!("{text}");
                }
                seen += 1;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(anyhow::anyhow!("gateway connection error: {e}")),
            None => break,
        }
    }
    Ok(())
}

async fn run_node(cfg: NodeConfig) -> anyhow::Result<()> {
    let self_id = new_player_id();
    let rpc_addr: SocketAddr = cfg.node.rpc_addr.parse()?;

    tracing::info!(
        player = self_id,
        rpc_addr = %cfg.node.rpc_addr,
        gateway_addr = %cfg.node.gateway_addr,
        version = env!("CARGO_PKG_VERSION"),
        "starting tangram-node"
    );

    let rng = ring::rand::SystemRandom::new();
    let pkcs8 = ring::signature::Ed25519KeyPair::generate_pkcs8(&rng)
        .map_err(|_| anyhow::anyhow!("failed to generate node keypair"))?;
    let transport = Arc::new(QuicTransport::new(rpc_addr, pkcs8.as_ref())?);

    let pool = ConnectionPool::new();
    let self_peer = Peer {
        id: self_id,
        address: cfg.node.rpc_addr.clone(),
        name: cfg.node.name.clone(),
    };

    let (config, state) = match &cfg.node.bootstrap_addr {
        Some(addr) => {
            tracing::info!(%addr, "joining existing session");
            let conn = transport.dial(addr.parse()?).await?;
            let (snapshot, game_config, bootstrap_id) = connect_to_game(&conn, &self_peer).await?;
            pool.insert(bootstrap_id, conn).await;
            (game_config, snapshot)
        }
        None => {
            let game_config_path = expand_tilde(&cfg.node.game_config);
            let game_config = load_game_config(&game_config_path)?;
            let mut snapshot = GameState::new_local(&game_config, self_peer.clone(), now_unix_ms());
            if game_config.host_mode {
                // First peer in a fresh hosted session is trivially its
                // own election winner; no peers exist yet to contend.
                snapshot.host = self_id;
            }
            (game_config, snapshot)
        }
    };

    let config = Arc::new(config);
    let state = Arc::new(Mutex::new(state));
    let directory = Arc::new(Mutex::new(PeerDirectory::new()));

    let node_rpc = Arc::new(NodeRpc::new(
        self_peer.clone(),
        state.clone(),
        pool.clone(),
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
        self_peer.clone(),
        state.clone(),
        config.clone(),
        directory.clone(),
        replication.clone(),
        peer_rpc.clone(),
    ));

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let membership_handle = tokio::spawn(run_membership_loop(
        self_id,
        state.clone(),
        directory.clone(),
        peer_rpc.clone(),
        shutdown_tx.subscribe(),
    ));

    let accept_handle = {
        let transport = transport.clone();
        let dispatcher = dispatcher.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move { transport.listen(dispatcher, shutdown_rx).await })
    };

    let gateway_state = Arc::new(GatewayState {
        engine: replication.clone(),
        config: config.clone(),
        me: self_peer.clone(),
    });
    let gateway_addr: SocketAddr = cfg.node.gateway_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(gateway_addr).await?;
    tracing::info!(%gateway_addr, "gateway listening");
    let gateway_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(gateway_state)).await {
            tracing::error!("gateway server error: {e}");
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(());

    gateway_handle.abort();
    let _ = tokio::join!(membership_handle, accept_handle);

    Ok(())
}

/// Performs the initial `Connect` handshake against a bootstrap peer
/// whose `PlayerId` is not yet known, so it is done directly over the
/// freshly dialled connection rather than through [`NodeRpc`] (which
/// resolves peers by id through local state).
async fn connect_to_game(
    conn: &quinn::Connection,
    self_peer: &Peer,
) -> anyhow::Result<(GameState, GameConfig, PlayerId)> {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use tangram_protocol::codec::MessageCodec;
    use tangram_protocol::{ConnectRequest, Response};

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
        .ok_or_else(|| anyhow::anyhow!("bootstrap peer closed the stream without responding"))??;

    let (mut state, config, bootstrap_id) = match resp {
        Response::Connect(c) => (
            GameState::from(c.state),
            GameConfig::from(c.config),
            c.player.id,
        ),
        Response::Error(e) => {
            return Err(anyhow::anyhow!("bootstrap peer rejected Connect: {}", e.kind))
        }
        _ => return Err(anyhow::anyhow!("bootstrap peer sent an unexpected response to Connect")),
    };

    match sync_time_over_connection(conn).await {
        Ok(origin_time) => state.origin_time_unix_ms = origin_time,
        Err(e) => tracing::warn!("time sync against bootstrap peer failed: {e}"),
    }

    Ok((state, config, bootstrap_id))
}
