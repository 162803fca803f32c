use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Error as SqlxError, Row};
use std::time::Duration;
use tracing::info;

use crate::db::StoreError;
use crate::models::Snapshot;

/// Postgres-backed snapshot store.
///
/// One row per entity id; every save replaces the whole blob. The blob
/// itself is stored as jsonb and never interpreted here.
pub struct DbSnapshots {
    pool: PgPool,
}

impl DbSnapshots {
    /// Create a new database connection pool
    pub async fn new(database_url: &str) -> Result<Self, SqlxError> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await?;

        info!("Database connection pool created successfully");

        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// Get a reference to the connection pool
    pub fn _pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<(), SqlxError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entity_snapshots (
                entity_id TEXT PRIMARY KEY,
                state JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Load the latest snapshot for an entity, if any exists.
    pub async fn load_snapshot(&self, entity_id: &str) -> Result<Option<Snapshot>, StoreError> {
        let row = sqlx::query(
            "SELECT entity_id, state, updated_at FROM entity_snapshots WHERE entity_id = $1",
        )
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let state: Json<Value> = row.try_get("state").map_err(StoreError::Database)?;
                let updated_at: DateTime<Utc> =
                    row.try_get("updated_at").map_err(StoreError::Database)?;
                Ok(Some(Snapshot {
                    entity_id: entity_id.to_string(),
                    state: state.0,
                    updated_at,
                }))
            }
            None => Ok(None),
        }
    }

    /// Replace the snapshot for an entity wholesale.
    pub async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO entity_snapshots (entity_id, state, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (entity_id)
            DO UPDATE SET state = EXCLUDED.state, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&snapshot.entity_id)
        .bind(Json(&snapshot.state))
        .bind(snapshot.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
