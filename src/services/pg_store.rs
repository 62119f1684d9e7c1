use crate::schema::{EVENTS_DDL, NewEvent, StoredEvent};
use crate::services::store::{EventStore, StoreError};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::time::Duration;

const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(sqlx::FromRow)]
struct EventRow {
    seq: i64,
    id: String,
    request_id: String,
    author: String,
    action: String,
    from_branch: Option<String>,
    to_branch: String,
    timestamp: DateTime<Utc>,
}

impl TryFrom<EventRow> for StoredEvent {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(StoredEvent {
            seq: row.seq,
            action: row.action.parse().map_err(StoreError::Decode)?,
            id: row.id,
            request_id: row.request_id,
            author: row.author,
            from_branch: row.from_branch,
            to_branch: row.to_branch,
            timestamp: row.timestamp,
        })
    }
}

pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Opens the pool, checks the server answers, and makes sure the
    /// `events` table exists.
    pub async fn connect(options: PgConnectOptions) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.ping().await?;
        sqlx::raw_sql(EVENTS_DDL).execute(&store.pool).await?;
        Ok(store)
    }
}

#[async_trait::async_trait]
impl EventStore for PgEventStore {
    async fn append(&self, event: NewEvent) -> Result<StoredEvent, StoreError> {
        let row = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            r#"
            INSERT INTO events (id, request_id, author, action, from_branch, to_branch)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING seq, timestamp
            "#,
        )
        .bind(&event.id)
        .bind(&event.request_id)
        .bind(&event.author)
        .bind(event.action.as_str())
        .bind(&event.from_branch)
        .bind(&event.to_branch)
        .fetch_one(&self.pool)
        .await;

        match row {
            Ok((seq, timestamp)) => Ok(StoredEvent::from_new(event, seq, timestamp)),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateId(event.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn recent(&self, limit: i64) -> Result<Vec<StoredEvent>, StoreError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT seq, id, request_id, author, action, from_branch, to_branch, timestamp
            FROM events
            ORDER BY timestamp DESC, seq DESC
            LIMIT $1
            "#,
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StoredEvent::try_from).collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EventAction;

    fn row(action: &str) -> EventRow {
        EventRow {
            seq: 3,
            id: "42_merge".into(),
            request_id: "42".into(),
            author: "carol".into(),
            action: action.into(),
            from_branch: Some("fix".into()),
            to_branch: "main".into(),
            timestamp: Utc::now(),
        }
    }

    fn event(id: &str, action: EventAction) -> NewEvent {
        NewEvent {
            id: id.to_string(),
            request_id: id.trim_end_matches("_merge").to_string(),
            author: "Alice".into(),
            action,
            from_branch: (action != EventAction::Push).then(|| "fix".to_string()),
            to_branch: "main".into(),
        }
    }

    /// Connects to `DATABASE_URL` inside a fresh schema so tests can run in
    /// parallel. Returns `None` when no database is configured.
    async fn isolated_store() -> Option<(PgEventStore, String)> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping postgres test");
            return None;
        };
        let options: PgConnectOptions = url.parse().unwrap();
        let schema = format!("hookstore_test_{}", uuid::Uuid::new_v4().simple());

        let admin = PgPool::connect_with(options.clone()).await.unwrap();
        sqlx::raw_sql(&format!("CREATE SCHEMA {schema}"))
            .execute(&admin)
            .await
            .unwrap();
        admin.close().await;

        let store = PgEventStore::connect(options.options([("search_path", schema.as_str())]))
            .await
            .unwrap();
        Some((store, schema))
    }

    async fn drop_schema(store: PgEventStore, schema: &str) {
        sqlx::raw_sql(&format!("DROP SCHEMA {schema} CASCADE"))
            .execute(&store.pool)
            .await
            .unwrap();
        store.pool.close().await;
    }

    #[test]
    fn decodes_known_actions() {
        let event = StoredEvent::try_from(row("merge")).unwrap();
        assert_eq!(event.action, EventAction::Merge);
        assert_eq!(event.request_id, "42");
        assert_eq!(event.seq, 3);
    }

    #[test]
    fn unknown_action_is_a_decode_error() {
        assert!(matches!(
            StoredEvent::try_from(row("deploy")),
            Err(StoreError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn append_returns_store_assigned_position() {
        let Some((store, schema)) = isolated_store().await else {
            return;
        };

        let first = store.append(event("abc123", EventAction::Push)).await.unwrap();
        let second = store.append(event("42", EventAction::PullRequest)).await.unwrap();
        assert_eq!(first.id, "abc123");
        assert_eq!(first.from_branch, None);
        assert_eq!(second.from_branch.as_deref(), Some("fix"));
        assert!(second.seq > first.seq);
        assert!(second.timestamp >= first.timestamp);

        // bootstrap is idempotent
        sqlx::raw_sql(EVENTS_DDL).execute(&store.pool).await.unwrap();

        drop_schema(store, &schema).await;
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected_not_upserted() {
        let Some((store, schema)) = isolated_store().await else {
            return;
        };

        store.append(event("abc123", EventAction::Push)).await.unwrap();
        let mut again = event("abc123", EventAction::Push);
        again.author = "Mallory".into();
        let err = store.append(again).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(id) if id == "abc123"));

        let stored = store.recent(10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].author, "Alice");

        drop_schema(store, &schema).await;
    }

    #[tokio::test]
    async fn recent_orders_by_timestamp_then_insertion() {
        let Some((store, schema)) = isolated_store().await else {
            return;
        };

        for id in ["c1", "c2", "c3"] {
            store.append(event(id, EventAction::Push)).await.unwrap();
        }

        // two rows sharing one timestamp, later than everything appended above
        let tied = Utc::now() + chrono::Duration::hours(1);
        for id in ["tie_a", "tie_b"] {
            sqlx::query(
                "INSERT INTO events (id, request_id, author, action, to_branch, timestamp) \
                 VALUES ($1, $1, 'Bob', 'push', 'main', $2)",
            )
            .bind(id)
            .bind(tied)
            .execute(&store.pool)
            .await
            .unwrap();
        }

        let recent = store.recent(4).await.unwrap();
        let ids: Vec<_> = recent.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["tie_b", "tie_a", "c3", "c2"]);

        assert_eq!(store.recent(2).await.unwrap().len(), 2);
        assert_eq!(store.recent(50).await.unwrap().len(), 5);
        assert!(store.recent(0).await.unwrap().is_empty());

        drop_schema(store, &schema).await;
    }
}
