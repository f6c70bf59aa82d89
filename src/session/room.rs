//! Per-room actor task.
//!
//! Each active room is one spawned task owning its SessionState and a
//! command channel. All mutations for a room flow through that channel in
//! arrival order, so state is serialized per room while unrelated rooms run
//! fully in parallel. The task hydrates from the snapshot store before
//! serving commands, and tears itself down (registry entry included) when
//! its last participant leaves.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::ai::{self, AiPayload, AiProvider, AiRequestType};
use crate::error::SessionError;
use crate::session::protocol::{JoinUser, Position, SelectionSpan, ServerEvent};
use crate::session::registry::SessionConfig;
use crate::session::state::{
    ChatMessage, CursorPos, Participant, SelectionRange, SessionState,
};
use crate::store::RoomStore;
use crate::ws::{send_event, ConnectionSender};

/// Commands processed by a room task, in strict arrival order.
pub enum RoomCommand {
    Join {
        conn_id: String,
        user_id: String,
        user: JoinUser,
        sender: ConnectionSender,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Leave {
        conn_id: String,
        /// Acked after cleanup (and eviction, when this was the last leave)
        done: Option<oneshot::Sender<()>>,
    },
    CodeChange {
        conn_id: String,
        file: String,
        content: String,
        cursor: Option<Position>,
        selection: Option<SelectionSpan>,
    },
    CursorMove {
        conn_id: String,
        file: String,
        position: Position,
    },
    SelectionChange {
        conn_id: String,
        file: String,
        selection: SelectionSpan,
    },
    Chat {
        conn_id: String,
        sender: Option<String>,
        content: String,
        timestamp: Option<i64>,
    },
    ChatHistory {
        conn_id: String,
    },
    AiRequest {
        conn_id: String,
        request_type: AiRequestType,
        payload: AiPayload,
    },
    /// Sent by a debounce sleeper; stale generations are ignored.
    DebounceFired { file: String, generation: u64 },
}

/// Handle to a live room task. Cloned into every joined connection's actor.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    pub task_id: Uuid,
    tx: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    /// Send a command; a closed channel means the room was evicted and the
    /// command is dropped (callers treat this as best-effort).
    pub fn send(&self, cmd: RoomCommand) -> Result<(), SessionError> {
        self.tx.send(cmd).map_err(|_| SessionError::RoomClosed)
    }
}

/// An edit burst waiting for its quiet window to elapse.
struct PendingEdit {
    generation: u64,
    origin: String,
    timer: JoinHandle<()>,
}

pub(crate) fn spawn(
    room_id: String,
    rooms: Arc<DashMap<String, RoomHandle>>,
    store: Arc<dyn RoomStore>,
    ai: Arc<dyn AiProvider>,
    config: SessionConfig,
) -> RoomHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = RoomHandle {
        task_id: Uuid::new_v4(),
        tx: tx.clone(),
    };
    let task_id = handle.task_id;

    tokio::spawn(run(room_id, task_id, rx, tx, rooms, store, ai, config));

    handle
}

#[allow(clippy::too_many_arguments)]
async fn run(
    room_id: String,
    task_id: Uuid,
    mut rx: mpsc::UnboundedReceiver<RoomCommand>,
    self_tx: mpsc::UnboundedSender<RoomCommand>,
    rooms: Arc<DashMap<String, RoomHandle>>,
    store: Arc<dyn RoomStore>,
    ai: Arc<dyn AiProvider>,
    config: SessionConfig,
) {
    // Hydrate before serving any command. Exactly one hydration happens per
    // room activation: only the task spawned by the registry's vacant-entry
    // winner reaches this point.
    let record = match store.find_room(&room_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            shutdown(&room_id, task_id, &rooms, &mut rx, SessionError::RoomNotFound);
            return;
        }
        Err(e) => {
            tracing::warn!(room_id = %room_id, error = %e, "Room hydration failed");
            shutdown(&room_id, task_id, &rooms, &mut rx, SessionError::Store(e));
            return;
        }
    };

    tracing::info!(room_id = %room_id, files = record.files.len(), "Room session hydrated");

    let mut task = RoomTask {
        task_id,
        rooms,
        store,
        ai,
        config,
        state: SessionState::hydrate(room_id.clone(), &record.files),
        senders: HashMap::new(),
        pending: HashMap::new(),
        generations: HashMap::new(),
        self_tx,
    };

    while let Some(cmd) = rx.recv().await {
        if task.handle(cmd).await == Flow::Evict {
            break;
        }
    }

    // Eviction: the registry entry is already gone (removed in the Leave
    // handler). Drain commands that raced with the removal — joins are told
    // to retry against a fresh entry, everything else is dropped.
    rx.close();
    while let Ok(cmd) = rx.try_recv() {
        match cmd {
            RoomCommand::Join { reply, .. } => {
                let _ = reply.send(Err(SessionError::RoomClosed));
            }
            RoomCommand::Leave { done, .. } => {
                if let Some(done) = done {
                    let _ = done.send(());
                }
            }
            _ => {}
        }
    }

    tracing::info!(room_id = %room_id, "Room session evicted");
}

/// Fail out a room task that never became live: remove the registry entry,
/// then answer every queued join with the hydration error.
fn shutdown(
    room_id: &str,
    task_id: Uuid,
    rooms: &DashMap<String, RoomHandle>,
    rx: &mut mpsc::UnboundedReceiver<RoomCommand>,
    error: SessionError,
) {
    rooms.remove_if(room_id, |_, handle| handle.task_id == task_id);
    rx.close();
    while let Ok(cmd) = rx.try_recv() {
        match cmd {
            RoomCommand::Join { reply, .. } => {
                let _ = reply.send(Err(error.clone()));
            }
            RoomCommand::Leave { done, .. } => {
                if let Some(done) = done {
                    let _ = done.send(());
                }
            }
            _ => {}
        }
    }
}

#[derive(PartialEq)]
enum Flow {
    Continue,
    Evict,
}

struct RoomTask {
    task_id: Uuid,
    rooms: Arc<DashMap<String, RoomHandle>>,
    store: Arc<dyn RoomStore>,
    ai: Arc<dyn AiProvider>,
    config: SessionConfig,
    state: SessionState,
    /// connection id -> outbound channel, kept alongside the participant map
    senders: HashMap<String, ConnectionSender>,
    /// per-file pending debounce timers
    pending: HashMap<String, PendingEdit>,
    /// per-file edit generation counters; a new edit supersedes older timers
    generations: HashMap<String, u64>,
    self_tx: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomTask {
    async fn handle(&mut self, cmd: RoomCommand) -> Flow {
        match cmd {
            RoomCommand::Join {
                conn_id,
                user_id,
                user,
                sender,
                reply,
            } => {
                self.join(conn_id, user_id, user, sender, reply);
                Flow::Continue
            }
            RoomCommand::Leave { conn_id, done } => {
                let flow = self.leave(&conn_id);
                if let Some(done) = done {
                    let _ = done.send(());
                }
                flow
            }
            RoomCommand::CodeChange {
                conn_id,
                file,
                content,
                cursor,
                selection,
            } => {
                self.code_change(conn_id, file, content, cursor, selection);
                Flow::Continue
            }
            RoomCommand::CursorMove {
                conn_id,
                file,
                position,
            } => {
                if self.state.participants.contains_key(&conn_id) {
                    self.state
                        .cursors
                        .insert(conn_id.clone(), CursorPos::new(&file, position));
                    self.broadcast_except(
                        &conn_id,
                        &ServerEvent::CursorUpdate {
                            user_id: conn_id.clone(),
                            file,
                            position,
                        },
                    );
                }
                Flow::Continue
            }
            RoomCommand::SelectionChange {
                conn_id,
                file,
                selection,
            } => {
                if self.state.participants.contains_key(&conn_id) {
                    self.state.selections.insert(
                        conn_id.clone(),
                        SelectionRange {
                            file: file.clone(),
                            start: selection.start,
                            end: selection.end,
                        },
                    );
                    self.broadcast_except(
                        &conn_id,
                        &ServerEvent::SelectionUpdate {
                            user_id: conn_id.clone(),
                            file,
                            selection,
                        },
                    );
                }
                Flow::Continue
            }
            RoomCommand::Chat {
                conn_id,
                sender,
                content,
                timestamp,
            } => {
                self.chat(conn_id, sender, content, timestamp);
                Flow::Continue
            }
            RoomCommand::ChatHistory { conn_id } => {
                let messages: Vec<ChatMessage> = self.state.chat_log.iter().cloned().collect();
                self.send_to(&conn_id, &ServerEvent::ChatHistory { messages });
                Flow::Continue
            }
            RoomCommand::AiRequest {
                conn_id,
                request_type,
                payload,
            } => {
                self.ai_request(conn_id, request_type, payload);
                Flow::Continue
            }
            RoomCommand::DebounceFired { file, generation } => {
                self.debounce_fired(file, generation).await;
                Flow::Continue
            }
        }
    }

    fn join(
        &mut self,
        conn_id: String,
        user_id: String,
        user: JoinUser,
        sender: ConnectionSender,
        reply: oneshot::Sender<Result<(), SessionError>>,
    ) {
        let participant = Participant {
            id: user_id,
            username: user.username.unwrap_or_else(|| "anonymous".to_string()),
            color: user.color,
        };

        self.state
            .participants
            .insert(conn_id.clone(), participant.clone());
        self.senders.insert(conn_id.clone(), sender);

        // Full snapshot to the joiner
        self.send_to(
            &conn_id,
            &ServerEvent::RoomState {
                users: self.state.roster(),
                files: self.state.documents.clone(),
                cursors: self.state.cursors.clone(),
                selections: self.state.selections.clone(),
                chat_history: self.state.chat_log.iter().cloned().collect(),
            },
        );

        // Roster change to everyone else
        self.broadcast_except(
            &conn_id,
            &ServerEvent::UserJoined {
                user: participant,
                users: self.state.roster(),
            },
        );

        let _ = reply.send(Ok(()));
    }

    fn leave(&mut self, conn_id: &str) -> Flow {
        if self.state.remove_connection(conn_id).is_none() {
            return Flow::Continue;
        }
        self.senders.remove(conn_id);

        self.broadcast_all(&ServerEvent::UserLeft {
            user_id: conn_id.to_string(),
            users: self.state.roster(),
        });

        if self.state.is_empty() {
            // Remove our own registry entry (and only ours — a fresh task may
            // already have replaced it if a join raced ahead), stop all
            // pending debounce timers, and exit.
            self.rooms
                .remove_if(&self.state.room_id, |_, handle| handle.task_id == self.task_id);
            for (_, pending) in self.pending.drain() {
                pending.timer.abort();
            }
            return Flow::Evict;
        }
        Flow::Continue
    }

    fn code_change(
        &mut self,
        conn_id: String,
        file: String,
        content: String,
        cursor: Option<Position>,
        selection: Option<SelectionSpan>,
    ) {
        if !self.state.participants.contains_key(&conn_id) {
            return;
        }

        // The in-memory copy reflects the edit immediately; only the
        // broadcast and the durable write are debounced.
        self.state.documents.insert(file.clone(), content);

        if let Some(position) = cursor {
            self.state
                .cursors
                .insert(conn_id.clone(), CursorPos::new(&file, position));
        }
        if let Some(span) = selection {
            self.state.selections.insert(
                conn_id.clone(),
                SelectionRange {
                    file: file.clone(),
                    start: span.start,
                    end: span.end,
                },
            );
        }

        // Supersede any pending timer for this file
        let generation = {
            let counter = self.generations.entry(file.clone()).or_insert(0);
            *counter += 1;
            *counter
        };

        let tx = self.self_tx.clone();
        let timer_file = file.clone();
        let quiet = self.config.debounce;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let _ = tx.send(RoomCommand::DebounceFired {
                file: timer_file,
                generation,
            });
        });

        if let Some(previous) = self.pending.insert(
            file,
            PendingEdit {
                generation,
                origin: conn_id,
                timer,
            },
        ) {
            previous.timer.abort();
        }
    }

    async fn debounce_fired(&mut self, file: String, generation: u64) {
        // A newer edit raced the timer: its own sleeper will fire later.
        let origin = match self.pending.get(&file) {
            Some(pending) if pending.generation == generation => pending.origin.clone(),
            _ => return,
        };
        self.pending.remove(&file);

        let content = match self.state.documents.get(&file) {
            Some(content) => content.clone(),
            None => return,
        };

        self.broadcast_except(
            &origin,
            &ServerEvent::CodeUpdate {
                file: file.clone(),
                content,
                user_id: origin.clone(),
                cursor: self.state.cursors.get(&origin).cloned(),
                selection: self.state.selections.get(&origin).cloned(),
            },
        );

        // Persistence piggy-backs on the debounce: a durable write happens
        // only when the save interval has elapsed since the last one. An
        // edit that fires under the floor is broadcast but not written.
        if self.state.last_persisted_at.elapsed() < self.config.save_interval {
            return;
        }

        let files: Vec<(String, String)> = self
            .state
            .documents
            .iter()
            .map(|(path, content)| (path.clone(), content.clone()))
            .collect();

        match self.store.save_files(&self.state.room_id, files).await {
            Ok(()) => {
                self.state.last_persisted_at = Instant::now();
                self.send_to(&origin, &ServerEvent::CodeSaved);
            }
            Err(e) => {
                tracing::warn!(
                    room_id = %self.state.room_id,
                    error = %e,
                    "Durable room save failed"
                );
                self.send_to(
                    &origin,
                    &ServerEvent::Error {
                        message: "Failed to save changes".to_string(),
                    },
                );
            }
        }
    }

    fn chat(
        &mut self,
        conn_id: String,
        sender: Option<String>,
        content: String,
        timestamp: Option<i64>,
    ) {
        let Some(participant) = self.state.participants.get(&conn_id) else {
            return;
        };
        let message = ChatMessage {
            sender: sender.unwrap_or_else(|| participant.username.clone()),
            content,
            timestamp: timestamp.unwrap_or_else(|| Utc::now().timestamp_millis()),
        };
        self.state.push_chat(message.clone());

        self.broadcast_except(
            &conn_id,
            &ServerEvent::ChatMessage {
                sender: message.sender,
                content: message.content,
                timestamp: message.timestamp,
            },
        );
    }

    fn ai_request(&mut self, conn_id: String, request_type: AiRequestType, payload: AiPayload) {
        let Some(requester) = self.senders.get(&conn_id).cloned() else {
            return;
        };

        let request = match ai::build_prompt(request_type, &payload) {
            Ok(request) => request,
            Err(message) => {
                send_event(
                    &requester,
                    &ServerEvent::AiError {
                        request_type,
                        message,
                    },
                );
                return;
            }
        };

        // The provider call runs outside the room task so a slow completion
        // never stalls edits or presence. The response goes to the whole
        // room, requester included; failures reach only the requester.
        let provider = self.ai.clone();
        let everyone: Vec<ConnectionSender> = self.senders.values().cloned().collect();
        tokio::spawn(async move {
            match provider
                .generate(&request.prompt, &request.language, &request.context)
                .await
            {
                Ok(response) => {
                    let event = ServerEvent::AiResponse {
                        user_id: conn_id,
                        request_type,
                        response,
                    };
                    for sender in &everyone {
                        send_event(sender, &event);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "AI provider call failed");
                    send_event(
                        &requester,
                        &ServerEvent::AiError {
                            request_type,
                            message: e.to_string(),
                        },
                    );
                }
            }
        });
    }

    fn send_to(&self, conn_id: &str, event: &ServerEvent) {
        if let Some(sender) = self.senders.get(conn_id) {
            send_event(sender, event);
        }
    }

    fn broadcast_except(&self, origin: &str, event: &ServerEvent) {
        for (conn_id, sender) in &self.senders {
            if conn_id != origin {
                send_event(sender, event);
            }
        }
    }

    fn broadcast_all(&self, event: &ServerEvent) {
        for sender in self.senders.values() {
            send_event(sender, event);
        }
    }
}
