//! WebSocket upgrade handler and per-connection event loop.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use roomcast::{ChannelConnection, Frame, Outbound};
use roomcast_common::ConnectionId;

use crate::error::GatewayError;
use crate::AppState;

use super::events::{ClientMessage, ServerMessage};
use super::handler::handle_client_message;

/// Close code sent when the server disconnects a client.
const CLOSE_SERVER_DISCONNECT: u16 = 4000;

type WsSink = SplitSink<WebSocket, Message>;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let connection_id = ConnectionId::generate();
    let (conn, mut outbound_rx) =
        ChannelConnection::new(connection_id.clone(), state.config.fanout.connection_buffer);
    state.connections.insert(Arc::new(conn));

    // Every connection is addressable through a room named after its ID.
    if let Err(err) = state.registry.add(&connection_id, &connection_id) {
        tracing::warn!(%connection_id, %err, "failed to join own room");
    }

    tracing::info!(%connection_id, "connection established");

    if send_json(&mut ws_tx, &ServerMessage::hello(&connection_id)).await.is_ok() {
        loop {
            tokio::select! {
                // Client sends us a message.
                msg = ws_rx.next() => {
                    let text = match msg {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            tracing::debug!(?e, %connection_id, "ws read error");
                            break;
                        }
                        Some(Ok(_)) => continue,
                    };

                    let reply = match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => handle_client_message(&state, &connection_id, client_msg)
                            .await
                            .unwrap_or_else(|err| ServerMessage::error(err.detail())),
                        Err(e) => ServerMessage::error(
                            GatewayError::bad_request(format!("invalid message: {e}")).detail(),
                        ),
                    };
                    if send_json(&mut ws_tx, &reply).await.is_err() {
                        break;
                    }
                }

                // Packet or disconnect request from the broadcast engine.
                outbound = outbound_rx.recv() => {
                    match outbound {
                        Some(Outbound::Packet { packet, .. }) => {
                            if send_frames(&mut ws_tx, packet.frames()).await.is_err() {
                                break;
                            }
                        }
                        Some(Outbound::Disconnect { close }) => {
                            if close {
                                let _ = send_close(&mut ws_tx, CLOSE_SERVER_DISCONNECT, "Disconnected by server").await;
                            }
                            break;
                        }
                        None => break,
                    }
                }
            }
        }
    }

    state.registry.remove_all(&connection_id);
    state.connections.remove(&connection_id);

    tracing::info!(%connection_id, "connection ended");
}

async fn send_json(ws_tx: &mut WsSink, msg: &ServerMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    ws_tx.send(Message::Text(json.into())).await
}

async fn send_frames(ws_tx: &mut WsSink, frames: &[Frame]) -> Result<(), axum::Error> {
    for frame in frames {
        let msg = match frame {
            Frame::Text(text) => Message::Text(text.clone().into()),
            Frame::Binary(bytes) => Message::Binary(bytes.clone().into()),
        };
        ws_tx.send(msg).await?;
    }
    Ok(())
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(ws_tx: &mut WsSink, code: u16, reason: &str) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(axum::extract::ws::CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
