use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::types::{GenerationRequest, Session, TripSummary};

mod memory;
mod redis_store;

pub use memory::InMemorySessionStore;
pub use redis_store::RedisSessionStore;

pub type SessionStoreFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, SessionStoreError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session {0} was not found or has expired")]
    NotFound(String),
    #[error("session backend failure: {0}")]
    Backend(String),
}

/// Keeps trip summaries around so postcards can be regenerated without re-upload.
pub trait SessionStore: Send + Sync {
    fn create<'a>(
        &'a self,
        summary: TripSummary,
        original_request: GenerationRequest,
    ) -> SessionStoreFuture<'a, Session>;

    fn get<'a>(&'a self, session_id: &'a str) -> SessionStoreFuture<'a, Session>;
}

/// Picks the redis store when a URL is configured, otherwise process memory.
pub async fn build_session_store(
    session_store_url: Option<&str>,
    ttl_seconds: u64,
) -> Result<Arc<dyn SessionStore>, SessionStoreError> {
    let ttl = ttl_from_seconds(ttl_seconds);
    match session_store_url {
        Some(url) => Ok(Arc::new(RedisSessionStore::new(url, ttl).await?)),
        None => Ok(Arc::new(InMemorySessionStore::new(ttl))),
    }
}

const MAX_TTL_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

pub(crate) fn ttl_from_seconds(ttl_seconds: u64) -> Duration {
    Duration::seconds(ttl_seconds.min(MAX_TTL_SECONDS) as i64)
}

/// Session ids are v4 UUIDs; anything else can never be a live session.
pub(crate) fn parse_session_id(session_id: &str) -> Result<Uuid, SessionStoreError> {
    Uuid::parse_str(session_id.trim())
        .map_err(|_| SessionStoreError::NotFound(session_id.to_string()))
}
