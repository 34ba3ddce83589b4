//! Shared gateway state

use lexroute_common::config::AppConfig;
use lexroute_common::errors::{AppError, Result};
use lexroute_common::metrics;
use lexroute_context::{QueryEngine, Session};
use moka::future::Cache;
use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// A session is driven by one turn at a time
pub type SessionHandle = Arc<Mutex<Session>>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: Arc<QueryEngine>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, engine: Arc<QueryEngine>) -> Self {
        let sessions = SessionStore::new(SessionLimits::from_config(&config));
        Self {
            config,
            engine,
            sessions,
        }
    }
}

/// Bounds on how many sessions are kept and for how long
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// `None` keeps idle sessions until they are closed
    pub idle_ttl: Option<Duration>,
    pub max_sessions: u64,
}

impl SessionLimits {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            idle_ttl: config.session_idle_ttl(),
            max_sessions: config.server.max_sessions.max(1) as u64,
        }
    }
}

/// In-process registry of open sessions.
///
/// Every lookup refreshes a session's idle timer. Sessions idle past the
/// TTL expire, and once the store is full the least recently used one
/// is dropped to admit a new session.
#[derive(Clone)]
pub struct SessionStore {
    cache: Cache<Uuid, SessionHandle>,
    idle_ttl: Option<Duration>,
}

impl SessionStore {
    pub fn new(limits: SessionLimits) -> Self {
        let mut builder = Cache::builder()
            .max_capacity(limits.max_sessions)
            .eviction_policy(EvictionPolicy::lru())
            .eviction_listener(|id: Arc<Uuid>, _session: SessionHandle, cause: RemovalCause| {
                let reason = match cause {
                    RemovalCause::Expired => "idle",
                    RemovalCause::Size => "capacity",
                    // explicit removal and replacement are not evictions
                    _ => return,
                };
                metrics::record_sessions_evicted(1, reason);
                tracing::info!(session_id = %id, reason, "Session evicted");
            });

        if let Some(ttl) = limits.idle_ttl {
            builder = builder.time_to_idle(ttl);
        }

        Self {
            cache: builder.build(),
            idle_ttl: limits.idle_ttl,
        }
    }

    pub async fn insert(&self, session: Session) -> Uuid {
        let id = Uuid::now_v7();
        self.cache.insert(id, Arc::new(Mutex::new(session))).await;
        self.cache.run_pending_tasks().await;
        metrics::set_active_sessions(self.cache.entry_count() as usize);
        id
    }

    /// Look up a session and mark it active
    pub async fn get(&self, id: Uuid) -> Result<SessionHandle> {
        self.cache
            .get(&id)
            .await
            .ok_or_else(|| AppError::SessionNotFound { id: id.to_string() })
    }

    pub async fn remove(&self, id: Uuid) -> Result<SessionHandle> {
        let removed = self
            .cache
            .remove(&id)
            .await
            .ok_or_else(|| AppError::SessionNotFound { id: id.to_string() })?;
        self.cache.run_pending_tasks().await;
        metrics::set_active_sessions(self.cache.entry_count() as usize);
        Ok(removed)
    }

    /// Drop every session idle past the TTL, returning how many went
    pub async fn evict_idle(&self) -> usize {
        let before = self.cache.entry_count();
        self.cache.run_pending_tasks().await;
        let after = self.cache.entry_count();
        metrics::set_active_sessions(after as usize);
        before.saturating_sub(after) as usize
    }

    /// Sweep idle sessions in the background; `None` when expiry is off
    pub fn spawn_idle_sweeper(&self) -> Option<JoinHandle<()>> {
        let period = self.idle_ttl?.min(Duration::from_secs(60));
        let store = self.clone();

        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let evicted = store.evict_idle().await;
                if evicted > 0 {
                    tracing::debug!(evicted, "Idle session sweep");
                }
            }
        }))
    }

    pub async fn len(&self) -> usize {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count() as usize
    }
}
