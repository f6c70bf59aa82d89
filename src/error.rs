//! Error taxonomy for the session core.
//!
//! Nothing here is process-fatal: join failures are surfaced as `error`
//! events to the offending connection, persistence failures are reported
//! and retried at the next eligible save, provider failures reach only
//! the requesting connection.

use thiserror::Error;

/// Errors produced by the room snapshot store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("database task join error: {0}")]
    Join(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Errors produced by session operations.
///
/// `RoomClosed` is internal: it marks a join that raced with eviction and
/// is retried by the registry, never surfaced to a client.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("room is shutting down")]
    RoomClosed,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from external AI / VCS providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(String),

    #[error("provider returned an unusable response: {0}")]
    BadResponse(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Request(e.to_string())
    }
}
