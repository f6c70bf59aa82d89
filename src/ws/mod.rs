pub mod actor;
pub mod handler;
pub mod protocol;

use axum::extract::ws::Message;
use tokio::sync::mpsc;

use crate::session::protocol::ServerEvent;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system (room tasks, AI bridge) clone this to push
/// events to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// Serialize a server event and queue it on a connection.
/// A closed channel means the client is gone; the event is dropped.
pub fn send_event(tx: &ConnectionSender, event: &ServerEvent) {
    match serde_json::to_string(event) {
        Ok(json) => {
            let _ = tx.send(Message::Text(json.into()));
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize server event");
        }
    }
}
