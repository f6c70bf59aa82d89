//! Durable room snapshot storage.
//!
//! The session core consumes this as an interface: it reads one snapshot at
//! hydration and writes the full document set back at throttled intervals.
//! `SqliteRoomStore` is the production implementation; `MemoryRoomStore` is
//! an instrumented double for tests.

pub mod memory;
pub mod retention;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::StoreError;

pub use memory::MemoryRoomStore;
pub use sqlite::SqliteRoomStore;

/// One file snapshot inside a room.
#[derive(Debug, Clone, Serialize)]
pub struct RoomFile {
    pub path: String,
    pub content: String,
    pub version: i64,
    pub last_modified: DateTime<Utc>,
}

/// Durable room document.
#[derive(Debug, Clone, Serialize)]
pub struct RoomRecord {
    pub id: String,
    pub name: String,
    pub repo: Option<String>,
    pub created_by: String,
    pub github_username: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub files: Vec<RoomFile>,
}

/// Parameters for room creation.
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub name: String,
    pub repo: Option<String>,
    pub created_by: String,
    pub github_username: Option<String>,
    pub ttl: Duration,
}

/// Room snapshot store consumed by the session registry and the HTTP surface.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Create a room with an expiry of now + ttl and no files.
    async fn create_room(&self, new: NewRoom) -> Result<RoomRecord, StoreError>;

    /// Fetch a room with its file snapshots. `None` for unknown or expired rooms.
    async fn find_room(&self, room_id: &str) -> Result<Option<RoomRecord>, StoreError>;

    /// Write the full document set for a room: upsert every (path, content)
    /// pair, bump versions of changed files, and touch last_activity.
    async fn save_files(&self, room_id: &str, files: Vec<(String, String)>)
        -> Result<(), StoreError>;

    /// Fetch one file's content.
    async fn get_file(&self, room_id: &str, path: &str) -> Result<Option<String>, StoreError>;

    /// Update an existing file. Returns false if the file does not exist.
    async fn update_file(
        &self,
        room_id: &str,
        path: &str,
        content: String,
    ) -> Result<bool, StoreError>;

    /// Delete rooms whose expiry has passed. Returns the number purged.
    async fn purge_expired(&self) -> Result<usize, StoreError>;
}
