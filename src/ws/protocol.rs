//! Inbound event dispatch for one WebSocket connection.
//!
//! Translates decoded client events into room commands. Everything except
//! joinRoom requires the connection to be Active in a room; a malformed
//! payload or an out-of-order event gets an `error` reply and never touches
//! session state.

use crate::error::SessionError;
use crate::session::protocol::{ClientEvent, ServerEvent};
use crate::session::room::{RoomCommand, RoomHandle};
use crate::state::AppState;
use crate::ws::{send_event, ConnectionSender};

/// Per-connection dispatch context. `joined` tracks the connection's
/// lifecycle: None = Unbound, Some = Active in exactly one room.
pub struct ConnContext {
    pub conn_id: String,
    pub user_id: String,
    pub username: String,
    pub tx: ConnectionSender,
    pub joined: Option<JoinedRoom>,
}

pub struct JoinedRoom {
    pub room_id: String,
    pub handle: RoomHandle,
}

/// Handle an incoming text (JSON) message: decode and dispatch.
pub async fn handle_text_message(text: &str, ctx: &mut ConnContext, state: &AppState) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(
                conn_id = %ctx.conn_id,
                error = %e,
                "Failed to decode client event"
            );
            send_error(ctx, "Invalid event payload");
            return;
        }
    };

    dispatch_event(event, ctx, state).await;
}

async fn dispatch_event(event: ClientEvent, ctx: &mut ConnContext, state: &AppState) {
    match event {
        ClientEvent::JoinRoom { room_id, mut user } => {
            // Re-join of the current room refreshes the roster entry and
            // resends the snapshot without tearing the session down.
            if let Some(joined) = &ctx.joined {
                if joined.room_id != room_id {
                    let old = ctx.joined.take();
                    if let Some(old) = old {
                        let _ = old.handle.send(RoomCommand::Leave {
                            conn_id: ctx.conn_id.clone(),
                            done: None,
                        });
                    }
                }
            }

            if user.username.is_none() {
                user.username = Some(ctx.username.clone());
            }

            match state
                .registry
                .join(&room_id, &ctx.conn_id, &ctx.user_id, user, ctx.tx.clone())
                .await
            {
                Ok(handle) => {
                    tracing::info!(
                        conn_id = %ctx.conn_id,
                        room_id = %room_id,
                        "Connection joined room"
                    );
                    ctx.joined = Some(JoinedRoom { room_id, handle });
                }
                Err(SessionError::RoomNotFound) => {
                    send_error(ctx, "Room not found");
                }
                Err(e) => {
                    tracing::warn!(
                        conn_id = %ctx.conn_id,
                        room_id = %room_id,
                        error = %e,
                        "Join failed"
                    );
                    send_error(ctx, "Failed to join room");
                }
            }
        }
        ClientEvent::LeaveRoom => {
            if let Some(joined) = ctx.joined.take() {
                let _ = joined.handle.send(RoomCommand::Leave {
                    conn_id: ctx.conn_id.clone(),
                    done: None,
                });
            }
        }
        ClientEvent::CodeChange {
            file,
            content,
            cursor,
            selection,
        } => {
            send_to_room(
                ctx,
                RoomCommand::CodeChange {
                    conn_id: ctx.conn_id.clone(),
                    file,
                    content,
                    cursor,
                    selection,
                },
            );
        }
        ClientEvent::CursorMove { file, position } => {
            send_to_room(
                ctx,
                RoomCommand::CursorMove {
                    conn_id: ctx.conn_id.clone(),
                    file,
                    position,
                },
            );
        }
        ClientEvent::SelectionChange { file, selection } => {
            send_to_room(
                ctx,
                RoomCommand::SelectionChange {
                    conn_id: ctx.conn_id.clone(),
                    file,
                    selection,
                },
            );
        }
        ClientEvent::SendChatMessage {
            sender,
            content,
            timestamp,
            ..
        } => {
            send_to_room(
                ctx,
                RoomCommand::Chat {
                    conn_id: ctx.conn_id.clone(),
                    sender,
                    content,
                    timestamp,
                },
            );
        }
        ClientEvent::GetChatHistory { .. } => {
            send_to_room(
                ctx,
                RoomCommand::ChatHistory {
                    conn_id: ctx.conn_id.clone(),
                },
            );
        }
        ClientEvent::AiRequest {
            request_type,
            payload,
            ..
        } => {
            send_to_room(
                ctx,
                RoomCommand::AiRequest {
                    conn_id: ctx.conn_id.clone(),
                    request_type,
                    payload,
                },
            );
        }
    }
}

/// Forward a command to the connection's current room. Unjoined connections
/// get an error; a closed room channel (eviction race) is best-effort.
fn send_to_room(ctx: &ConnContext, cmd: RoomCommand) {
    match &ctx.joined {
        Some(joined) => {
            let _ = joined.handle.send(cmd);
        }
        None => {
            send_error(ctx, "Join a room first");
        }
    }
}

fn send_error(ctx: &ConnContext, message: &str) {
    send_event(
        &ctx.tx,
        &ServerEvent::Error {
            message: message.to_string(),
        },
    );
}
