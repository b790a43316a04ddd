//! SQLite-backed content store.
//!
//! SQLite is the source of truth. Documents are stored as JSON field maps keyed
//! by (collection, id); a single meta row carries the store revision.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use tokio::sync::Mutex;

use super::{ContentStore, MonotonicClock, Precondition, SnapshotCallback, SubscriberSet};
use crate::errors::AppError;
use crate::models::{strip_reserved, Collection, Document, Fields, Filter, Snapshot};
use crate::subscription::Subscription;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1,
            revision_id INTEGER NOT NULL DEFAULT 0,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO meta (id, schema_version, revision_id, generated_at)
        VALUES (1, 1, 0, datetime('now'));
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            fields TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (collection, id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_documents_created_at ON documents(collection, created_at);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Persistent [`ContentStore`] over a SQLite pool.
pub struct SqliteStore {
    pool: SqlitePool,
    /// Held across write + snapshot + push so pushes follow commit order
    commit: Mutex<()>,
    subscribers: Arc<SubscriberSet>,
    clock: MonotonicClock,
}

impl SqliteStore {
    /// Open the store at `db_path`, creating the schema if needed.
    pub async fn open(db_path: &Path) -> Result<Self, AppError> {
        let pool = init_database(db_path).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, AppError> {
        // Resume the clock after the newest stored stamp so ordering survives restarts.
        let latest: Option<String> = sqlx::query("SELECT MAX(updated_at) AS latest FROM documents")
            .fetch_one(&pool)
            .await?
            .try_get("latest")?;
        let clock = match latest {
            Some(ts) => MonotonicClock::starting_after(parse_timestamp(&ts)?),
            None => MonotonicClock::new(),
        };

        Ok(Self {
            pool,
            commit: Mutex::new(()),
            subscribers: SubscriberSet::new(),
            clock,
        })
    }

    async fn load_snapshot(&self, collection: Collection) -> Result<Snapshot, AppError> {
        let revision = self.current_revision().await?;
        let rows = sqlx::query(
            "SELECT id, fields, created_at, updated_at, version FROM documents WHERE collection = ? ORDER BY created_at, id",
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await?;

        let documents = rows
            .iter()
            .map(document_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Snapshot {
            collection,
            revision,
            documents,
        })
    }

    async fn current_revision(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("revision_id")?)
    }

    async fn fetch_version(
        tx: &mut Transaction<'_, Sqlite>,
        collection: Collection,
        id: &str,
    ) -> Result<Option<(i64, Fields)>, AppError> {
        let row = sqlx::query("SELECT version, fields FROM documents WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

        match row {
            Some(row) => {
                let version: i64 = row.try_get("version")?;
                let fields: String = row.try_get("fields")?;
                Ok(Some((version, parse_fields(&fields)?)))
            }
            None => Ok(None),
        }
    }

    async fn increment_revision(tx: &mut Transaction<'_, Sqlite>) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(&now)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn push(&self, collection: Collection) {
        match self.load_snapshot(collection).await {
            Ok(snapshot) => self.subscribers.deliver(&snapshot),
            Err(e) => {
                tracing::error!(%collection, "Failed to load snapshot after write: {}", e);
                self.subscribers.fail(collection, &e.message());
            }
        }
    }

    async fn write_merged(
        tx: &mut Transaction<'_, Sqlite>,
        collection: Collection,
        id: &str,
        merged: &Fields,
        now: &str,
        current_version: i64,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE documents SET fields = ?, updated_at = ?, version = ? WHERE collection = ? AND id = ? AND version = ?",
        )
        .bind(serde_json::to_string(merged)?)
        .bind(now)
        .bind(current_version + 1)
        .bind(collection.as_str())
        .bind(id)
        .bind(current_version)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict {
                message: "Concurrent modification detected".to_string(),
                current_version,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn subscribe_filtered(
        &self,
        collection: Collection,
        filter: Filter,
        callback: SnapshotCallback,
    ) -> Result<Subscription, AppError> {
        let _commit = self.commit.lock().await;

        let snapshot = self.load_snapshot(collection).await?;
        let (id, subscription) = self.subscribers.register(collection, filter, callback);
        self.subscribers.deliver_to(id, &snapshot);

        Ok(subscription)
    }

    async fn create(&self, collection: Collection, fields: Fields) -> Result<String, AppError> {
        let _commit = self.commit.lock().await;
        let id = uuid::Uuid::new_v4().to_string();
        let now = format_timestamp(self.clock.now());
        let fields = strip_reserved(fields);

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO documents (collection, id, fields, created_at, updated_at, version) VALUES (?, ?, ?, ?, ?, 1)",
        )
        .bind(collection.as_str())
        .bind(&id)
        .bind(serde_json::to_string(&fields)?)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        Self::increment_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::debug!(%collection, %id, "Document created");
        self.push(collection).await;
        Ok(id)
    }

    async fn upsert(
        &self,
        collection: Collection,
        id: &str,
        fields: Fields,
    ) -> Result<(), AppError> {
        let _commit = self.commit.lock().await;
        let now = format_timestamp(self.clock.now());
        let fields = strip_reserved(fields);

        let mut tx = self.pool.begin().await?;
        match Self::fetch_version(&mut tx, collection, id).await? {
            Some((version, mut merged)) => {
                merged.extend(fields);
                Self::write_merged(&mut tx, collection, id, &merged, &now, version).await?;
            }
            None => {
                sqlx::query(
                    "INSERT INTO documents (collection, id, fields, created_at, updated_at, version) VALUES (?, ?, ?, ?, ?, 1)",
                )
                .bind(collection.as_str())
                .bind(id)
                .bind(serde_json::to_string(&fields)?)
                .bind(&now)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
            }
        }
        Self::increment_revision(&mut tx).await?;
        tx.commit().await?;

        self.push(collection).await;
        Ok(())
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Fields,
        precondition: Option<Precondition>,
    ) -> Result<(), AppError> {
        let _commit = self.commit.lock().await;
        let now = format_timestamp(self.clock.now());
        let fields = strip_reserved(fields);

        let mut tx = self.pool.begin().await?;
        let (version, mut merged) = Self::fetch_version(&mut tx, collection, id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Document {}/{} not found", collection, id))
            })?;

        if let Some(Precondition::Version(expected)) = precondition {
            if version != expected {
                return Err(AppError::Conflict {
                    message: format!(
                        "Version mismatch: expected {}, current {}",
                        expected, version
                    ),
                    current_version: version,
                });
            }
        }

        merged.extend(fields);
        Self::write_merged(&mut tx, collection, id, &merged, &now, version).await?;
        Self::increment_revision(&mut tx).await?;
        tx.commit().await?;

        self.push(collection).await;
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), AppError> {
        let _commit = self.commit.lock().await;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Document {}/{} not found",
                collection, id
            )));
        }

        Self::increment_revision(&mut tx).await?;
        tx.commit().await?;

        self.push(collection).await;
        Ok(())
    }

    async fn snapshot(&self, collection: Collection) -> Result<Snapshot, AppError> {
        self.load_snapshot(collection).await
    }

    async fn revision(&self) -> Result<i64, AppError> {
        self.current_revision().await
    }
}

// Helper functions for row conversion

fn document_from_row(row: &SqliteRow) -> Result<Document, AppError> {
    let fields: String = row.try_get("fields")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Document {
        id: row.try_get("id")?,
        fields: parse_fields(&fields)?,
        created_at: Some(parse_timestamp(&created_at)?),
        updated_at: Some(parse_timestamp(&updated_at)?),
        version: row.try_get("version")?,
    })
}

fn parse_fields(s: &str) -> Result<Fields, AppError> {
    match serde_json::from_str(s) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::Store("Stored fields are not a JSON object".to_string())),
        Err(e) => Err(AppError::Store(format!("Corrupt stored fields: {}", e))),
    }
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Store(format!("Corrupt stored timestamp '{}': {}", s, e)))
}
