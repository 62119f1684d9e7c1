use crate::config::StoreBackend;
use crate::schema::{NewEvent, StoredEvent};
use crate::services::pg_store::PgEventStore;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("event store unavailable: {0}")]
    Unavailable(String),
    #[error("event `{0}` already stored")]
    DuplicateId(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored event could not be decoded: {0}")]
    Decode(String),
}

#[async_trait::async_trait]
pub trait EventStore: Send + Sync {
    /// Appends one event. Never overwrites: an existing `id` is a `DuplicateId`.
    async fn append(&self, event: NewEvent) -> Result<StoredEvent, StoreError>;
    /// Up to `limit` events, newest first, insertion order breaking timestamp ties.
    async fn recent(&self, limit: i64) -> Result<Vec<StoredEvent>, StoreError>;
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreStatus {
    Connected,
    Disconnected,
}

/// Handle passed to request handlers. Whether a backend is present is decided
/// once at startup and never changes afterwards.
#[derive(Clone)]
pub enum Store {
    Connected(Arc<dyn EventStore>),
    Disconnected,
}

impl Store {
    /// Resolves the configured backend. Any connection failure leaves the
    /// service running in the disconnected state.
    pub async fn open(backend: &StoreBackend) -> Self {
        let target = match backend {
            StoreBackend::Memory => {
                tracing::info!("using in-memory event store");
                return Self::connected(MemoryEventStore::new());
            }
            StoreBackend::Postgres(target) => target,
        };

        tracing::info!(database = %target.redacted(), "connecting to database");
        let options = match target.connect_options() {
            Ok(options) => options,
            Err(e) => {
                tracing::error!(error = %e, "invalid database connection settings");
                return Self::Disconnected;
            }
        };

        match PgEventStore::connect(options).await {
            Ok(store) => {
                tracing::info!("database connection successful");
                Self::connected(store)
            }
            Err(e) => {
                tracing::error!(error = %e, "database connection failed");
                Self::Disconnected
            }
        }
    }

    pub fn connected(backend: impl EventStore + 'static) -> Self {
        Self::Connected(Arc::new(backend))
    }

    pub fn status(&self) -> StoreStatus {
        match self {
            Self::Connected(_) => StoreStatus::Connected,
            Self::Disconnected => StoreStatus::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    pub async fn append(&self, event: NewEvent) -> Result<StoredEvent, StoreError> {
        match self {
            Self::Connected(backend) => backend.append(event).await,
            Self::Disconnected => Err(StoreError::Unavailable("not connected".into())),
        }
    }

    /// Reads degrade to an empty list rather than failing.
    pub async fn recent(&self, limit: i64) -> Vec<StoredEvent> {
        let Self::Connected(backend) = self else {
            return Vec::new();
        };
        match backend.recent(limit).await {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch recent events");
                Vec::new()
            }
        }
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        match self {
            Self::Connected(backend) => backend.ping().await,
            Self::Disconnected => Err(StoreError::Unavailable("not connected".into())),
        }
    }
}

#[derive(Default)]
struct MemoryInner {
    events: Vec<StoredEvent>,
    next_seq: i64,
}

/// Process-local backend. Keeps the same uniqueness and ordering rules as
/// the Postgres table.
#[derive(Default)]
pub struct MemoryEventStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl EventStore for MemoryEventStore {
    async fn append(&self, event: NewEvent) -> Result<StoredEvent, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.events.iter().any(|e| e.id == event.id) {
            return Err(StoreError::DuplicateId(event.id));
        }

        // wall clock may step backwards; stored timestamps must not
        let now = Utc::now();
        let timestamp = match inner.events.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };
        inner.next_seq += 1;
        let stored = StoredEvent::from_new(event, inner.next_seq, timestamp);
        inner.events.push(stored.clone());
        Ok(stored)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<StoredEvent>, StoreError> {
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let inner = self.inner.lock().await;
        Ok(inner.events.iter().rev().take(limit).cloned().collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
