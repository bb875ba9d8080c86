use std::collections::HashMap;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{SessionStore, SessionStoreError, SessionStoreFuture, parse_session_id};
use crate::postcard::types::{GenerationRequest, Session, TripSummary};

/// Process-local store. Expired sessions read as missing and are pruned on create.
pub struct InMemorySessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create<'a>(
        &'a self,
        summary: TripSummary,
        original_request: GenerationRequest,
    ) -> SessionStoreFuture<'a, Session> {
        Box::pin(async move {
            let now = Utc::now();
            let id = Uuid::new_v4();
            let session = Session {
                session_id: id.to_string(),
                trip_summary: summary,
                original_request,
                created_at: now,
                expires_at: now + self.ttl,
            };

            let mut sessions = self.sessions.write().await;
            let before = sessions.len();
            sessions.retain(|_, existing| existing.expires_at > now);
            let pruned = before - sessions.len();
            if pruned > 0 {
                debug!(pruned, "pruned expired sessions");
            }
            sessions.insert(id, session.clone());

            Ok(session)
        })
    }

    fn get<'a>(&'a self, session_id: &'a str) -> SessionStoreFuture<'a, Session> {
        Box::pin(async move {
            let id = parse_session_id(session_id)?;
            let sessions = self.sessions.read().await;
            match sessions.get(&id) {
                Some(session) if session.expires_at > Utc::now() => Ok(session.clone()),
                _ => Err(SessionStoreError::NotFound(session_id.to_string())),
            }
        })
    }
}
