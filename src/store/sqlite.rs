//! SQLite-backed room snapshot store.
//!
//! rusqlite is synchronous; every operation clones the shared connection
//! handle and runs on the blocking pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::StoreError;
use crate::store::{NewRoom, RoomFile, RoomRecord, RoomStore};

pub struct SqliteRoomStore {
    db: DbPool,
}

impl SqliteRoomStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

fn parse_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn lock_err<T>(e: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Database(format!("DB lock error: {}", e))
}

fn join_err(e: tokio::task::JoinError) -> StoreError {
    StoreError::Join(e.to_string())
}

/// Read a room row plus its files inside one lock hold.
fn read_room(
    conn: &rusqlite::Connection,
    room_id: &str,
) -> Result<Option<RoomRecord>, StoreError> {
    let row = conn
        .query_row(
            "SELECT id, name, repo, created_by, github_username, expires_at, last_activity, created_at
             FROM rooms WHERE id = ?1",
            [room_id],
            |row| {
                Ok(RoomRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    repo: row.get(2)?,
                    created_by: row.get(3)?,
                    github_username: row.get(4)?,
                    expires_at: parse_ts(&row.get::<_, String>(5)?),
                    last_activity: parse_ts(&row.get::<_, String>(6)?),
                    created_at: parse_ts(&row.get::<_, String>(7)?),
                    files: Vec::new(),
                })
            },
        );

    let mut room = match row {
        Ok(r) => r,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    // Expired rooms are invisible even before the sweeper runs
    if room.expires_at <= Utc::now() {
        return Ok(None);
    }

    let mut stmt = conn.prepare(
        "SELECT path, content, version, last_modified FROM room_files WHERE room_id = ?1 ORDER BY path",
    )?;
    let files = stmt
        .query_map([room_id], |row| {
            Ok(RoomFile {
                path: row.get(0)?,
                content: row.get(1)?,
                version: row.get(2)?,
                last_modified: parse_ts(&row.get::<_, String>(3)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    room.files = files;

    Ok(Some(room))
}

#[async_trait]
impl RoomStore for SqliteRoomStore {
    async fn create_room(&self, new: NewRoom) -> Result<RoomRecord, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(lock_err)?;
            let now = Utc::now();
            let room = RoomRecord {
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

            conn.execute(
                "INSERT INTO rooms (id, name, repo, created_by, github_username, expires_at, last_activity, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    room.id,
                    room.name,
                    room.repo,
                    room.created_by,
                    room.github_username,
                    room.expires_at.to_rfc3339(),
                    room.last_activity.to_rfc3339(),
                    room.created_at.to_rfc3339(),
                ],
            )?;

            Ok(room)
        })
        .await
        .map_err(join_err)?
    }

    async fn find_room(&self, room_id: &str) -> Result<Option<RoomRecord>, StoreError> {
        let db = self.db.clone();
        let room_id = room_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(lock_err)?;
            read_room(&conn, &room_id)
        })
        .await
        .map_err(join_err)?
    }

    async fn save_files(
        &self,
        room_id: &str,
        files: Vec<(String, String)>,
    ) -> Result<(), StoreError> {
        let db = self.db.clone();
        let room_id = room_id.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = db.lock().map_err(lock_err)?;
            let now = Utc::now().to_rfc3339();

            let tx = conn.transaction()?;

            let room_exists: bool = tx
                .query_row("SELECT 1 FROM rooms WHERE id = ?1", [&room_id], |_| Ok(true))
                .unwrap_or(false);
            if !room_exists {
                return Err(StoreError::Database(format!(
                    "room {} no longer exists",
                    room_id
                )));
            }

            for (path, content) in &files {
                // Version bumps only when the content actually changed
                tx.execute(
                    "INSERT INTO room_files (room_id, path, content, version, last_modified)
                     VALUES (?1, ?2, ?3, 1, ?4)
                     ON CONFLICT(room_id, path) DO UPDATE SET
                         version = version + (content IS NOT excluded.content),
                         content = excluded.content,
                         last_modified = excluded.last_modified",
                    rusqlite::params![room_id, path, content, now],
                )?;
            }

            tx.execute(
                "UPDATE rooms SET last_activity = ?1 WHERE id = ?2",
                rusqlite::params![now, room_id],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(join_err)?
    }

    async fn get_file(&self, room_id: &str, path: &str) -> Result<Option<String>, StoreError> {
        let db = self.db.clone();
        let room_id = room_id.to_string();
        let path = path.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(lock_err)?;
            match conn.query_row(
                "SELECT content FROM room_files WHERE room_id = ?1 AND path = ?2",
                rusqlite::params![room_id, path],
                |row| row.get::<_, String>(0),
            ) {
                Ok(content) => Ok(Some(content)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(join_err)?
    }

    async fn update_file(
        &self,
        room_id: &str,
        path: &str,
        content: String,
    ) -> Result<bool, StoreError> {
        let db = self.db.clone();
        let room_id = room_id.to_string();
        let path = path.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(lock_err)?;
            let now = Utc::now().to_rfc3339();
            let changed = conn.execute(
                "UPDATE room_files SET content = ?1, version = version + 1, last_modified = ?2
                 WHERE room_id = ?3 AND path = ?4",
                rusqlite::params![content, now, room_id, path],
            )?;
            if changed > 0 {
                conn.execute(
                    "UPDATE rooms SET last_activity = ?1 WHERE id = ?2",
                    rusqlite::params![now, room_id],
                )?;
            }
            Ok(changed > 0)
        })
        .await
        .map_err(join_err)?
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(lock_err)?;
            let now = Utc::now().to_rfc3339();
            let purged = conn.execute("DELETE FROM rooms WHERE expires_at <= ?1", [now])?;
            Ok(purged)
        })
        .await
        .map_err(join_err)?
    }
}
