use std::sync::Arc;

use crate::ai::AiProvider;
use crate::session::registry::SessionRegistry;
use crate::store::RoomStore;
use crate::vcs::github::GithubClient;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Durable room snapshot store
    pub store: Arc<dyn RoomStore>,
    /// Active room sessions
    pub registry: Arc<SessionRegistry>,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// External AI completion provider
    pub ai: Arc<dyn AiProvider>,
    /// GitHub API client for commit / pull-request calls
    pub github: Arc<GithubClient>,
    /// TTL applied to newly created rooms
    pub room_ttl: chrono::Duration,
}
