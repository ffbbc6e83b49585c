use crate::{
    error::Result,
    ledger::{Ledger, StateWrite},
};
use async_trait::async_trait;
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};
use std::str::FromStr;

/// World state persisted in a single SQLite table, for local runs of `tripctl`.
#[derive(Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::from_str(database_url)?
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        ).await?;

        let ledger = Self { pool };
        ledger.migrate().await?;
        Ok(ledger)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS world_state (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT key FROM world_state WHERE key LIKE ? ORDER BY updated_at DESC
            "#,
        )
        .bind(format!("{}%", prefix))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get::<String, _>(0)).collect())
    }
}

const UPSERT: &str = r#"
    INSERT INTO world_state (key, value, updated_at)
    VALUES (?, ?, CURRENT_TIMESTAMP)
    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
"#;

#[async_trait]
impl Ledger for SqliteLedger {
    async fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query(
            r#"
            SELECT value FROM world_state WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        tracing::debug!("Ledger read {} (found: {})", key, row.is_some());
        Ok(row.map(|row| row.get::<Vec<u8>, _>(0)))
    }

    async fn put_state(&self, key: &str, value: Vec<u8>) -> Result<()> {
        sqlx::query(UPSERT)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn commit(&self, writes: Vec<StateWrite>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for write in &writes {
            sqlx::query(UPSERT)
                .bind(&write.key)
                .bind(&write.value)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        tracing::debug!("Ledger committed {} write(s)", writes.len());
        Ok(())
    }
}
