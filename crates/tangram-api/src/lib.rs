//! Tangram API -- the gateway adapter bridging a single local UI session
//! to the replication engine over a websocket.
//!
//! Serves exactly one connection at a time. State is a shared `Arc<State>`
//! passed into axum extractors; the read/write loop is a `select!` over a
//! subscribe channel and an inbound message channel.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use tangram_protocol::{TanId, WireGameConfig, WireGameState, WirePeer, WirePoint};
use tangram_replication::ReplicationEngine;
use tangram_state::{GameConfig, Peer, Point};

/// Shared state for the single websocket route.
pub struct GatewayState {
    pub engine: Arc<ReplicationEngine>,
    pub config: Arc<GameConfig>,
    pub me: Peer,
}

pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new().route("/ws", get(ws_upgrade)).with_state(state)
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Envelope for every message crossing the websocket, outbound and
/// inbound alike: `{"type": "...", ...fields}`.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum Outbound {
    #[serde(rename = "player")]
    Player { data: WirePeer },
    #[serde(rename = "config")]
    Config { data: WireGameConfig },
    #[serde(rename = "state")]
    State { data: WireGameState },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Inbound {
    GetState,
    ObtainTan {
        tan: TanId,
        release: bool,
    },
    MoveTan {
        tan: TanId,
        location: WirePoint,
        rotation: u32,
    },
}

async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>) {
    let (mut sink, mut stream) = socket.split();

    let (subscriber_id, mut changes) = state.engine.subscribe();

    if send_json(
        &mut sink,
        &Outbound::Player {
            data: state.me.clone().into(),
        },
    )
    .await
    .is_err()
    {
        state.engine.unsubscribe(subscriber_id);
        return;
    }
    if send_json(
        &mut sink,
        &Outbound::Config {
            data: (*state.config).clone().into(),
        },
    )
    .await
    .is_err()
    {
        state.engine.unsubscribe(subscriber_id);
        return;
    }
    if send_current_state(&mut sink, &state).await.is_err() {
        state.engine.unsubscribe(subscriber_id);
        return;
    }

    loop {
        tokio::select! {
            changed = changes.recv() => {
                if changed.is_none() {
                    tracing::debug!("gateway: change channel closed");
                    break;
                }
                if send_current_state(&mut sink, &state).await.is_err() {
                    break;
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_inbound(&text, &mut sink, &state).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        tracing::debug!("gateway: websocket closed");
                        break;
                    }
                    Some(Ok(_)) => {
                        // binary/ping/pong frames carry no protocol meaning here
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "gateway: websocket read error");
                        break;
                    }
                }
            }
        }
    }

    state.engine.unsubscribe(subscriber_id);
}

async fn handle_inbound(
    text: &str,
    sink: &mut (impl SinkExt<WsMessage, Error = axum::Error> + Unpin),
    state: &Arc<GatewayState>,
) {
    let msg: Inbound = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = %e, "gateway: malformed inbound message, ignoring");
            return;
        }
    };

    match msg {
        Inbound::GetState => {
            let _ = send_current_state(sink, state).await;
        }
        Inbound::ObtainTan { tan, release } => {
            if let Err(e) = state.engine.obtain(tan, release).await {
                tracing::warn!(tan, error = %e, "gateway: ObtainTan failed");
            }
        }
        Inbound::MoveTan {
            tan,
            location,
            rotation,
        } => {
            let location: Point = location.into();
            if let Err(e) = state.engine.move_tan(tan, location, rotation).await {
                tracing::warn!(tan, error = %e, "gateway: MoveTan failed");
            }
        }
    }
}

async fn send_current_state(
    sink: &mut (impl SinkExt<WsMessage, Error = axum::Error> + Unpin),
    state: &Arc<GatewayState>,
) -> Result<(), axum::Error> {
    let snapshot = {
        let handle = state.engine.state_handle();
        let guard = handle.lock().await;
        guard.clone()
    };
    send_json(
        sink,
        &Outbound::State {
            data: snapshot.into(),
        },
    )
    .await
}

async fn send_json(
    sink: &mut (impl SinkExt<WsMessage, Error = axum::Error> + Unpin),
    msg: &Outbound,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(msg).expect("outbound gateway message always serializes");
    sink.send(WsMessage::Text(text)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_obtain_tan_deserializes() {
        let json = r#"{"type":"ObtainTan","tan":3,"release":false}"#;
        let msg: Inbound = serde_json::from_str(json).unwrap();
        match msg {
            Inbound::ObtainTan { tan, release } => {
                assert_eq!(tan, 3);
                assert!(!release);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_inbound_move_tan_deserializes() {
        let json = r#"{"type":"MoveTan","tan":1,"location":{"x":10,"y":20},"rotation":90}"#;
        let msg: Inbound = serde_json::from_str(json).unwrap();
        match msg {
            Inbound::MoveTan {
                tan,
                location,
                rotation,
            } => {
                assert_eq!(tan, 1);
                assert_eq!(location.x, 10);
                assert_eq!(location.y, 20);
                assert_eq!(rotation, 90);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_inbound_get_state_deserializes() {
        let json = r#"{"type":"GetState"}"#;
        assert!(matches!(
            serde_json::from_str::<Inbound>(json).unwrap(),
            Inbound::GetState
        ));
    }

    #[test]
    fn test_outbound_player_serializes_with_type_tag() {
        let msg = Outbound::Player {
            data: WirePeer {
                id: 1,
                address: "127.0.0.1:9000".into(),
                name: "alice".into(),
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"player\""));
    }
}
