use chrono::{Duration, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use super::{SessionStore, SessionStoreError, SessionStoreFuture, parse_session_id};
use crate::postcard::types::{GenerationRequest, Session, TripSummary};

const SESSION_KEY_PREFIX: &str = "postcard:session:v1";

/// Sessions serialized as JSON with a redis-side expiry matching `expires_at`.
#[derive(Clone)]
pub struct RedisSessionStore {
    connection: ConnectionManager,
    ttl: Duration,
}

impl RedisSessionStore {
    pub async fn new(redis_url: &str, ttl: Duration) -> Result<Self, SessionStoreError> {
        let client = redis::Client::open(redis_url).map_err(backend_error)?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(backend_error)?;

        let mut health_connection = connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut health_connection)
            .await
            .map_err(|err| {
                SessionStoreError::Backend(format!("failed to connect to redis: {err}"))
            })?;

        Ok(Self { connection, ttl })
    }
}

impl SessionStore for RedisSessionStore {
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

            let payload = serde_json::to_string(&session).map_err(backend_error)?;
            let ttl_seconds = u64::try_from(self.ttl.num_seconds()).unwrap_or(0).max(1);
            let mut connection = self.connection.clone();
            let _: () = connection
                .set_ex(session_key(&id), payload, ttl_seconds)
                .await
                .map_err(backend_error)?;

            Ok(session)
        })
    }

    fn get<'a>(&'a self, session_id: &'a str) -> SessionStoreFuture<'a, Session> {
        Box::pin(async move {
            let id = parse_session_id(session_id)?;
            let mut connection = self.connection.clone();
            let payload: Option<String> = connection
                .get(session_key(&id))
                .await
                .map_err(backend_error)?;

            let payload =
                payload.ok_or_else(|| SessionStoreError::NotFound(session_id.to_string()))?;
            let session: Session = serde_json::from_str(&payload).map_err(backend_error)?;
            if session.expires_at <= Utc::now() {
                return Err(SessionStoreError::NotFound(session_id.to_string()));
            }
            Ok(session)
        })
    }
}

fn session_key(id: &Uuid) -> String {
    format!("{SESSION_KEY_PREFIX}:{id}")
}

fn backend_error(err: impl std::fmt::Display) -> SessionStoreError {
    SessionStoreError::Backend(err.to_string())
}
