//! Per-room in-memory session state.
//!
//! Owned exclusively by the room's task; nothing outside that task mutates
//! these maps. The document set diverges from the durable snapshot between
//! saves — it is the authoritative copy while the session lives.

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::session::protocol::Position;
use crate::store::RoomFile;

/// Chat log ring capacity.
pub const CHAT_LOG_CAP: usize = 100;

/// A user identity attached to one connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub username: String,
    pub color: Option<String>,
}

/// Last known caret position of a connection. Overwritten on each update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorPos {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl CursorPos {
    pub fn new(file: &str, position: Position) -> Self {
        Self {
            file: file.to_string(),
            line: position.line,
            column: position.column,
        }
    }
}

/// Last known selection of a connection. Overwritten on each update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionRange {
    pub file: String,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub content: String,
    /// Epoch milliseconds, server-assigned when the client omits it
    pub timestamp: i64,
}

/// Ephemeral state for one active room. Exists iff at least one connection
/// is joined; evicted the moment the participant count reaches zero.
pub struct SessionState {
    pub room_id: String,
    /// file path -> current content; keys are never pruned while the session lives
    pub documents: BTreeMap<String, String>,
    /// connection id -> identity
    pub participants: HashMap<String, Participant>,
    /// connection id -> caret
    pub cursors: HashMap<String, CursorPos>,
    /// connection id -> selection
    pub selections: HashMap<String, SelectionRange>,
    /// most recent messages, oldest first
    pub chat_log: VecDeque<ChatMessage>,
    /// throttles durable writes; seeded at hydration
    pub last_persisted_at: Instant,
}

impl SessionState {
    /// Seed a fresh session from a room's durable file snapshots.
    pub fn hydrate(room_id: String, files: &[RoomFile]) -> Self {
        let documents = files
            .iter()
            .map(|f| (f.path.clone(), f.content.clone()))
            .collect();
        Self {
            room_id,
            documents,
            participants: HashMap::new(),
            cursors: HashMap::new(),
            selections: HashMap::new(),
            chat_log: VecDeque::new(),
            last_persisted_at: Instant::now(),
        }
    }

    /// Append a chat message, evicting the oldest entry past the cap.
    pub fn push_chat(&mut self, message: ChatMessage) {
        self.chat_log.push_back(message);
        while self.chat_log.len() > CHAT_LOG_CAP {
            self.chat_log.pop_front();
        }
    }

    /// Drop all per-connection entries for a departing connection.
    /// Returns the removed participant, if it was joined.
    pub fn remove_connection(&mut self, conn_id: &str) -> Option<Participant> {
        self.cursors.remove(conn_id);
        self.selections.remove(conn_id);
        self.participants.remove(conn_id)
    }

    pub fn roster(&self) -> Vec<Participant> {
        self.participants.values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(n: usize) -> ChatMessage {
        ChatMessage {
            sender: "u".to_string(),
            content: format!("m{}", n),
            timestamp: n as i64,
        }
    }

    #[tokio::test]
    async fn chat_log_is_capped_at_100_in_order() {
        let mut state = SessionState::hydrate("r".to_string(), &[]);
        for n in 0..105 {
            state.push_chat(msg(n));
        }
        assert_eq!(state.chat_log.len(), CHAT_LOG_CAP);
        assert_eq!(state.chat_log.front().unwrap().content, "m5");
        assert_eq!(state.chat_log.back().unwrap().content, "m104");
        // Still in original insertion order
        let contents: Vec<_> = state.chat_log.iter().map(|m| m.timestamp).collect();
        let mut sorted = contents.clone();
        sorted.sort();
        assert_eq!(contents, sorted);
    }

    #[tokio::test]
    async fn remove_connection_clears_presence() {
        let mut state = SessionState::hydrate("r".to_string(), &[]);
        state.participants.insert(
            "c1".to_string(),
            Participant {
                id: "u1".to_string(),
                username: "alice".to_string(),
                color: None,
            },
        );
        state.cursors.insert(
            "c1".to_string(),
            CursorPos {
                file: "a.py".to_string(),
                line: 1,
                column: 1,
            },
        );

        let removed = state.remove_connection("c1");
        assert!(removed.is_some());
        assert!(state.cursors.is_empty());
        assert!(state.is_empty());
        assert!(state.remove_connection("c1").is_none());
    }
}
