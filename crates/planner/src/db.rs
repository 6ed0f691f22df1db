//! SQLite persistence. Each store is saved as one JSON document under its own
//! namespaced key, the way browser local storage would hold it.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use time::OffsetDateTime;

/// Storage key for the selection set.
pub const SELECTION_KEY: &str = "plant-selection";
/// Storage key for the zone set.
pub const ZONES_KEY: &str = "zone-config";

#[derive(Clone)]
pub struct Db {
    pool: Pool<Sqlite>,
}

impl Db {
    /// db_url examples:
    /// - "sqlite:/var/lib/garden-planner/planner.db"
    /// - "sqlite::memory:" (tests)
    pub async fn connect(db_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(db_url)
            .with_context(|| format!("invalid sqlite connection string: {db_url}"))?
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true);

        // Every in-memory connection is its own database, so pin exactly one.
        let pool_options = if db_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("failed to connect to sqlite db: {db_url}"))?;

        Ok(Self { pool })
    }

    /// Runs SQLx migrations from ./migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to run migrations")?;
        Ok(())
    }

    // ----------------------------
    // Raw documents
    // ----------------------------

    pub async fn load_document(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT body FROM documents WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("load_document failed key={key}"))?;

        row.map(|r| r.try_get::<String, _>("body"))
            .transpose()
            .context("load_document: bad body column")
    }

    pub async fn save_document(&self, key: &str, body: &str) -> Result<()> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        sqlx::query(
            r#"
            INSERT INTO documents (key, body, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
              body=excluded.body,
              updated_at=excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(body)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("save_document failed key={key}"))?;
        Ok(())
    }

    // ----------------------------
    // Typed helpers
    // ----------------------------

    /// Load and decode a document. `Ok(None)` when the key was never written.
    pub async fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(body) = self.load_document(key).await? else {
            return Ok(None);
        };
        let value = serde_json::from_str(&body)
            .with_context(|| format!("failed to decode document key={key}"))?;
        Ok(Some(value))
    }

    pub async fn save_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let body = serde_json::to_string(value)
            .with_context(|| format!("failed to encode document key={key}"))?;
        self.save_document(key, &body).await
    }
}

// ===========================================================================
// Tests
// ===========================================================================
