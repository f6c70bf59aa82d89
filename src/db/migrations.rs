use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking — no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "-- Migration 1: Rooms and file snapshots

CREATE TABLE rooms (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    repo TEXT,
    created_by TEXT NOT NULL,
    github_username TEXT,
    expires_at TEXT NOT NULL,
    last_activity TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX idx_rooms_expires ON rooms(expires_at);

CREATE TABLE room_files (
    room_id TEXT NOT NULL,
    path TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    version INTEGER NOT NULL DEFAULT 1,
    last_modified TEXT NOT NULL,
    PRIMARY KEY (room_id, path),
    FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE
);

CREATE INDEX idx_room_files_room ON room_files(room_id);
",
    )])
}
