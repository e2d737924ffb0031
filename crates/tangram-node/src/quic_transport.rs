//! QUIC transport -- endpoint management, dial, and the RPC accept loop.
//!
//! One bidirectional stream per RPC call: the caller writes a `Request`
//! framed with `MessageCodec<Request>`, the callee writes back exactly
//! one `Response` framed with `MessageCodec<Response>`, then the stream
//! is finished, dispatched by [`crate::rpc_server::Dispatcher`].

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio_util::codec::{FramedRead, FramedWrite};

use tangram_protocol::codec::MessageCodec;
use tangram_protocol::tls;
use tangram_protocol::{Request, Response};

use crate::rpc_server::Dispatcher;

/// QUIC transport layer: one server endpoint used for both accepting
/// inbound RPC connections and dialing outbound ones.
pub struct QuicTransport {
    pub endpoint: quinn::Endpoint,
    client_config: quinn::ClientConfig,
}

impl QuicTransport {
    /// Binds `listen_addr` and configures both the server (accept) and
    /// client (dial) sides from a freshly generated self-signed cert.
    pub fn new(
        listen_addr: SocketAddr,
        pkcs8_der: &[u8],
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let (cert_der, key_der) = tls::generate_self_signed_cert(pkcs8_der)?;
        let server_config = tls::build_server_config(cert_der, key_der)?;
        let client_config = tls::build_client_config()?;

        let endpoint = quinn::Endpoint::server(server_config, listen_addr)?;

        Ok(Self {
            endpoint,
            client_config,
        })
    }

    /// Dials a remote peer's RPC endpoint.
    pub async fn dial(
        &self,
        addr: SocketAddr,
    ) -> Result<quinn::Connection, Box<dyn std::error::Error + Send + Sync>> {
        let conn = self
            .endpoint
            .connect_with(self.client_config.clone(), addr, "tangram-node.local")?
            .await?;
        Ok(conn)
    }

    /// Runs the accept loop: spawns a task per inbound connection, each
    /// of which serves RPC calls until the peer disconnects or shutdown
    /// fires.
    pub async fn listen(&self, dispatcher: Arc<Dispatcher>, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                incoming = self.endpoint.accept() => {
                    match incoming {
                        Some(incoming) => {
                            let dispatcher = dispatcher.clone();
                            tokio::spawn(async move {
                                match incoming.await {
                                    Ok(conn) => {
                                        tracing::info!(
                                            remote = %conn.remote_address(),
                                            "accepted inbound connection"
                                        );
                                        run_connection(conn, dispatcher).await;
                                    }
                                    Err(e) => {
                                        tracing::warn!("failed to accept connection: {e}");
                                    }
                                }
                            });
                        }
                        None => {
                            tracing::info!("endpoint closed, stopping accept loop");
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("shutdown signal, stopping accept loop");
                    break;
                }
            }
        }
    }
}

/// Serves RPC calls on one connection: accepts bidirectional streams
/// until the peer disconnects, dispatching each independently.
async fn run_connection(conn: quinn::Connection, dispatcher: Arc<Dispatcher>) {
    let remote = conn.remote_address();
    loop {
        match conn.accept_bi().await {
            Ok((send, recv)) => {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_stream(send, recv, dispatcher).await {
                        tracing::debug!(%remote, "rpc stream error: {e}");
                    }
                });
            }
            Err(e) => {
                tracing::debug!(%remote, "connection closed: {e}");
                break;
            }
        }
    }
}

async fn handle_stream(
    send: quinn::SendStream,
    recv: quinn::RecvStream,
    dispatcher: Arc<Dispatcher>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut reader = FramedRead::new(recv, MessageCodec::<Request>::default());
    let mut writer = FramedWrite::new(send, MessageCodec::<Response>::default());

    let Some(req) = reader.next().await else {
        return Ok(());
    };
    let req = req?;

    let resp = dispatcher.handle(req).await;
    writer.send(resp).await?;
    writer.get_mut().finish()?;
    Ok(())
}
