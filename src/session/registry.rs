//! Concurrency-safe mapping from room id to live room task.
//!
//! The registry resolves joins: an existing entry is reused, a missing one
//! atomically spawns a room task that hydrates from the snapshot store.
//! The DashMap entry API makes lookup-or-spawn atomic, so two simultaneous
//! first-joins trigger exactly one hydration. Eviction is owned by the room
//! task itself; a join that races it simply retries against a fresh entry.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::ai::AiProvider;
use crate::error::SessionError;
use crate::session::protocol::JoinUser;
use crate::session::room::{self, RoomCommand, RoomHandle};
use crate::store::RoomStore;
use crate::ws::ConnectionSender;

/// Joins that race an eviction retry against a respawned room; the bound
/// exists so a pathological store cannot spin a connection forever.
const MAX_JOIN_ATTEMPTS: usize = 16;

/// Timing knobs for room tasks.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Quiet window before an edit burst is broadcast
    pub debounce: Duration,
    /// Minimum interval between durable snapshot writes
    pub save_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(1),
            save_interval: Duration::from_secs(60),
        }
    }
}

pub struct SessionRegistry {
    rooms: Arc<DashMap<String, RoomHandle>>,
    store: Arc<dyn RoomStore>,
    ai: Arc<dyn AiProvider>,
    config: SessionConfig,
}

impl SessionRegistry {
    pub fn new(
        store: Arc<dyn RoomStore>,
        ai: Arc<dyn AiProvider>,
        config: SessionConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            rooms: Arc::new(DashMap::new()),
            store,
            ai,
            config,
        })
    }

    /// Attach a connection to a room, spawning and hydrating the room task
    /// if this is the room's first join. On success the joiner has received
    /// its state snapshot and the rest of the room a `userJoined` event.
    pub async fn join(
        &self,
        room_id: &str,
        conn_id: &str,
        user_id: &str,
        user: JoinUser,
        sender: ConnectionSender,
    ) -> Result<RoomHandle, SessionError> {
        for _ in 0..MAX_JOIN_ATTEMPTS {
            let handle = self.lookup_or_spawn(room_id);

            let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
            let cmd = RoomCommand::Join {
                conn_id: conn_id.to_string(),
                user_id: user_id.to_string(),
                user: user.clone(),
                sender: sender.clone(),
                reply: reply_tx,
            };

            if handle.send(cmd).is_err() {
                // Channel closed between lookup and send: the room evicted
                // itself. Retry against a fresh entry.
                continue;
            }

            match reply_rx.await {
                Ok(Ok(())) => return Ok(handle),
                Ok(Err(SessionError::RoomClosed)) => continue,
                Ok(Err(e)) => return Err(e),
                // Task died before replying; treat like a closed room
                Err(_) => continue,
            }
        }

        Err(SessionError::RoomClosed)
    }

    fn lookup_or_spawn(&self, room_id: &str) -> RoomHandle {
        match self.rooms.entry(room_id.to_string()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let handle = room::spawn(
                    room_id.to_string(),
                    self.rooms.clone(),
                    self.store.clone(),
                    self.ai.clone(),
                    self.config,
                );
                entry.insert(handle.clone());
                handle
            }
        }
    }

    /// Whether a session currently exists for the room.
    pub fn is_active(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Number of currently active room sessions.
    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }
}
