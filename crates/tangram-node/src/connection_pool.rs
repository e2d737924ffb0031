//! Connection pool: caches one live QUIC connection per remote peer,
//! created lazily and evicted on failure, holding the live connection
//! itself rather than separate metadata.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use tangram_protocol::PlayerId;

use crate::quic_transport::QuicTransport;

#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<RwLock<HashMap<PlayerId, quinn::Connection>>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        ConnectionPool {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the cached connection to `peer`, or dials `addr` and
    /// caches the result. The pool lock is never held across the dial.
    pub async fn get_or_dial(
        &self,
        peer: PlayerId,
        addr: &str,
        transport: &QuicTransport,
    ) -> Result<quinn::Connection, Box<dyn std::error::Error + Send + Sync>> {
        if let Some(conn) = self.inner.read().await.get(&peer) {
            if conn.close_reason().is_none() {
                return Ok(conn.clone());
            }
        }

        let socket_addr: std::net::SocketAddr = addr.parse()?;
        let conn = transport.dial(socket_addr).await?;

        self.inner.write().await.insert(peer, conn.clone());
        Ok(conn)
    }

    /// Drops the cached connection to `peer` after an RPC failure.
    pub async fn evict(&self, peer: PlayerId) {
        self.inner.write().await.remove(&peer);
    }

    /// Seeds the pool with an already-established connection, for the
    /// bootstrap handshake (the dial happens before `peer`'s id is
    /// known, so `get_or_dial` cannot be used for it).
    pub async fn insert(&self, peer: PlayerId, conn: quinn::Connection) {
        self.inner.write().await.insert(peer, conn);
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}
