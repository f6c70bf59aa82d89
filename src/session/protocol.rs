//! Realtime wire protocol: JSON text frames carrying tagged events.
//!
//! Event names and payload fields mirror the editor client's catalog
//! (joinRoom/roomState/codeChange/codeUpdate/...). Inbound and outbound
//! events are separate enums — the server never parses its own output.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::ai::{AiPayload, AiRequestType};
use crate::session::state::{ChatMessage, CursorPos, Participant, SelectionRange};

/// A caret position inside a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

/// A selection span inside a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSpan {
    pub start: Position,
    pub end: Position,
}

/// Identity fields a client supplies on join; the authoritative user id
/// comes from the connection's token, never from this payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinUser {
    pub username: Option<String>,
    pub color: Option<String>,
}

/// Events received from clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    JoinRoom {
        room_id: String,
        #[serde(default)]
        user: JoinUser,
    },
    LeaveRoom,
    CodeChange {
        file: String,
        content: String,
        #[serde(default)]
        cursor: Option<Position>,
        #[serde(default)]
        selection: Option<SelectionSpan>,
    },
    CursorMove {
        file: String,
        position: Position,
    },
    SelectionChange {
        file: String,
        selection: SelectionSpan,
    },
    SendChatMessage {
        #[serde(default)]
        room_id: Option<String>,
        #[serde(default)]
        sender: Option<String>,
        content: String,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    GetChatHistory {
        #[serde(default)]
        room_id: Option<String>,
    },
    #[serde(rename = "ai:request")]
    AiRequest {
        #[serde(default)]
        room_id: Option<String>,
        request_type: AiRequestType,
        payload: AiPayload,
    },
}

/// Events sent to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    RoomState {
        users: Vec<Participant>,
        files: BTreeMap<String, String>,
        cursors: HashMap<String, CursorPos>,
        selections: HashMap<String, SelectionRange>,
        chat_history: Vec<ChatMessage>,
    },
    UserJoined {
        user: Participant,
        users: Vec<Participant>,
    },
    UserLeft {
        user_id: String,
        users: Vec<Participant>,
    },
    CodeUpdate {
        file: String,
        content: String,
        user_id: String,
        cursor: Option<CursorPos>,
        selection: Option<SelectionRange>,
    },
    CodeSaved,
    CursorUpdate {
        user_id: String,
        file: String,
        position: Position,
    },
    SelectionUpdate {
        user_id: String,
        file: String,
        selection: SelectionSpan,
    },
    ChatMessage {
        sender: String,
        content: String,
        timestamp: i64,
    },
    ChatHistory {
        messages: Vec<ChatMessage>,
    },
    #[serde(rename = "ai:response")]
    AiResponse {
        user_id: String,
        request_type: AiRequestType,
        response: String,
    },
    #[serde(rename = "ai:error")]
    AiError {
        request_type: AiRequestType,
        message: String,
    },
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_use_camel_case_tags() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"codeChange","file":"a.py","content":"x=1","cursor":{"line":1,"column":4}}"#,
        )
        .unwrap();
        match event {
            ClientEvent::CodeChange { file, cursor, .. } => {
                assert_eq!(file, "a.py");
                assert_eq!(cursor.unwrap().column, 4);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn ai_request_tag_keeps_colon() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"ai:request","requestType":"explain","payload":{"code":"x=1","language":"python"}}"#,
        )
        .unwrap();
        assert!(matches!(
            event,
            ClientEvent::AiRequest {
                request_type: AiRequestType::Explain,
                ..
            }
        ));
    }

    #[test]
    fn code_saved_serializes_as_bare_tag() {
        let json = serde_json::to_string(&ServerEvent::CodeSaved).unwrap();
        assert_eq!(json, r#"{"type":"codeSaved"}"#);
    }

    #[test]
    fn unknown_event_type_is_an_error() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"type":"nope"}"#).is_err());
    }
}
