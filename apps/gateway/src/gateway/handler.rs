//! Client op dispatch: join, leave, and emit.

use roomcast::{BroadcastOptions, Packet};
use roomcast_common::ConnectionId;

use crate::error::GatewayError;
use crate::AppState;

use super::events::{ClientMessage, ServerMessage};

/// Apply one client op on behalf of `connection_id` and build the reply.
pub async fn handle_client_message(
    state: &AppState,
    connection_id: &str,
    msg: ClientMessage,
) -> Result<ServerMessage, GatewayError> {
    let op = msg.op();
    match msg {
        ClientMessage::Join { room } => {
            if room != connection_id && ConnectionId::is_valid(&room) {
                return Err(GatewayError::forbidden_room(&room));
            }
            state.registry.add(connection_id, &room)?;
            Ok(ServerMessage::ack(op, serde_json::json!({ "room": room })))
        }
        ClientMessage::Leave { room } => {
            // Every connection stays in its own room until it disconnects.
            if ConnectionId::is_valid(&room) {
                return Err(GatewayError::forbidden_room(&room));
            }
            state.registry.remove(connection_id, &room)?;
            Ok(ServerMessage::ack(op, serde_json::json!({ "room": room })))
        }
        ClientMessage::Emit {
            event,
            data,
            rooms,
            except,
            volatile,
        } => {
            if event.is_empty() {
                return Err(GatewayError::bad_request("event name is required"));
            }

            // Senders never receive their own broadcast.
            let mut opts = BroadcastOptions::new().except(connection_id);
            opts.rooms.extend(rooms);
            opts.except.extend(except);
            opts.flags.volatile = volatile;

            let report = state.engine.broadcast(Packet::new(event, data), &opts).await?;
            Ok(ServerMessage::ack(
                op,
                serde_json::json!({
                    "sent": report.sent,
                    "failed": report.failed.len(),
                    "dropped": report.dropped.len(),
                }),
            ))
        }
    }
}
