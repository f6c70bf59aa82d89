//! In-memory room store, instrumented for tests.
//!
//! Counts hydrations and saves so tests can assert the registry's
//! single-hydration guarantee and the persistence throttle.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{NewRoom, RoomFile, RoomRecord, RoomStore};

#[derive(Default)]
pub struct MemoryRoomStore {
    rooms: DashMap<String, RoomRecord>,
    /// Number of find_room calls observed
    pub hydrations: AtomicUsize,
    /// Number of save_files calls observed
    pub saves: AtomicUsize,
    /// When set, save_files fails until cleared
    pub fail_saves: AtomicBool,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a room directly, bypassing create_room's id generation.
    pub fn seed_room(&self, room_id: &str, files: Vec<(&str, &str)>) {
        let now = Utc::now();
        let record = RoomRecord {
            id: room_id.to_string(),
            name: room_id.to_string(),
            repo: None,
            created_by: "seed".to_string(),
            github_username: None,
            expires_at: now + chrono::Duration::hours(24),
            last_activity: now,
            created_at: now,
            files: files
                .into_iter()
                .map(|(path, content)| RoomFile {
                    path: path.to_string(),
                    content: content.to_string(),
                    version: 1,
                    last_modified: now,
                })
                .collect(),
        };
        self.rooms.insert(room_id.to_string(), record);
    }

    pub fn hydration_count(&self) -> usize {
        self.hydrations.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Current durable content of a file, if any.
    pub fn file_content(&self, room_id: &str, path: &str) -> Option<String> {
        self.rooms.get(room_id).and_then(|r| {
            r.files
                .iter()
                .find(|f| f.path == path)
                .map(|f| f.content.clone())
        })
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn create_room(&self, new: NewRoom) -> Result<RoomRecord, StoreError> {
        let now = Utc::now();
        let record = RoomRecord {
            id: Uuid::now_v7().to_string(),
            name: new.name,
            repo: new.repo,
            created_by: new.created_by,
            github_username: new.github_username,
            expires_at: now + new.ttl,
            last_activity: now,
            created_at: now,
            files: Vec::new(),
        };
        self.rooms.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn find_room(&self, room_id: &str) -> Result<Option<RoomRecord>, StoreError> {
        self.hydrations.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rooms
            .get(room_id)
            .filter(|r| r.expires_at > Utc::now())
            .map(|r| r.clone()))
    }

    async fn save_files(
        &self,
        room_id: &str,
        files: Vec<(String, String)>,
    ) -> Result<(), StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Database("simulated write failure".to_string()));
        }

        let mut room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| StoreError::Database(format!("room {} no longer exists", room_id)))?;
        let now = Utc::now();
        for (path, content) in files {
            match room.files.iter_mut().find(|f| f.path == path) {
                Some(file) => {
                    if file.content != content {
                        file.content = content;
                        file.version += 1;
                        file.last_modified = now;
                    }
                }
                None => room.files.push(RoomFile {
                    path,
                    content,
                    version: 1,
                    last_modified: now,
                }),
            }
        }
        room.last_activity = now;
        Ok(())
    }

    async fn get_file(&self, room_id: &str, path: &str) -> Result<Option<String>, StoreError> {
        Ok(self.file_content(room_id, path))
    }

    async fn update_file(
        &self,
        room_id: &str,
        path: &str,
        content: String,
    ) -> Result<bool, StoreError> {
        let Some(mut room) = self.rooms.get_mut(room_id) else {
            return Ok(false);
        };
        let now = Utc::now();
        match room.files.iter_mut().find(|f| f.path == path) {
            Some(file) => {
                file.content = content;
                file.version += 1;
                file.last_modified = now;
                room.last_activity = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = Utc::now();
        let before = self.rooms.len();
        self.rooms.retain(|_, r| r.expires_at > now);
        Ok(before - self.rooms.len())
    }
}
