//! Postgres recipient pattern store
//!
//! Schema is created lazily on first use.

use super::MemoryStore;
use crate::error::EngineError;
use crate::models::{Kobo, RecipientPattern};
use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Decode, PgPool, Postgres, Row, Type};
use std::sync::Arc;
use tokio::sync::OnceCell;

pub struct PostgresPatternStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PostgresPatternStore {
    /// Build a pool without connecting; the first query connects.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)
            .map_err(|e| EngineError::DatabaseError(format!("Invalid database URL: {}", e)))?;

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS recipient_patterns (
                      user_id TEXT NOT NULL,
                      recipient_identifier TEXT NOT NULL,
                      bank_code TEXT NOT NULL,
                      account_name TEXT,
                      nicknames TEXT[] NOT NULL DEFAULT '{}',
                      historical_amounts BIGINT[] NOT NULL DEFAULT '{}',
                      use_count INTEGER NOT NULL DEFAULT 0,
                      last_used_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                      PRIMARY KEY (user_id, recipient_identifier, bank_code)
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| unavailable("initialize recipient memory schema", e))?;

        Ok(())
    }
}

fn unavailable(action: &str, error: sqlx::Error) -> EngineError {
    EngineError::ExternalUnavailable(format!("Failed to {}: {}", action, error))
}

fn decode_failed(column: &str, error: sqlx::Error) -> EngineError {
    EngineError::DatabaseError(format!("Failed to decode recipient_patterns.{}: {}", column, error))
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get(name).map_err(|e| decode_failed(name, e))
}

fn decode_pattern(user_id: &str, row: &PgRow) -> Result<RecipientPattern> {
    let amounts: Vec<i64> = column(row, "historical_amounts")?;
    let use_count: i32 = column(row, "use_count")?;
    let last_used_at: DateTime<Utc> = column(row, "last_used_at")?;

    Ok(RecipientPattern {
        user_id: user_id.to_string(),
        recipient_identifier: column(row, "recipient_identifier")?,
        bank_code: column(row, "bank_code")?,
        account_name: column(row, "account_name")?,
        nicknames: column(row, "nicknames")?,
        historical_amounts: amounts.into_iter().map(Kobo).collect(),
        use_count: u32::try_from(use_count).unwrap_or(0),
        last_used_at,
    })
}

#[async_trait::async_trait]
impl MemoryStore for PostgresPatternStore {
    async fn get_patterns(&self, user_id: &str) -> Result<Vec<RecipientPattern>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT recipient_identifier, bank_code, account_name, nicknames,
                   historical_amounts, use_count, last_used_at
            FROM recipient_patterns
            WHERE user_id = $1
            ORDER BY last_used_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| unavailable("load recipient patterns", e))?;

        let patterns = rows
            .iter()
            .map(|row| decode_pattern(user_id, row))
            .collect::<Result<Vec<_>>>()?;

        Ok(patterns)
    }

    async fn upsert_pattern(&self, user_id: &str, pattern: RecipientPattern) -> Result<()> {
        self.ensure_schema().await?;

        let amounts: Vec<i64> = pattern.historical_amounts.iter().map(|k| k.value()).collect();

        sqlx::query(
            r#"
            INSERT INTO recipient_patterns
              (user_id, recipient_identifier, bank_code, account_name, nicknames,
               historical_amounts, use_count, last_used_at)
            VALUES
              ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, recipient_identifier, bank_code) DO UPDATE SET
              account_name = EXCLUDED.account_name,
              nicknames = EXCLUDED.nicknames,
              historical_amounts = EXCLUDED.historical_amounts,
              use_count = EXCLUDED.use_count,
              last_used_at = EXCLUDED.last_used_at
            "#,
        )
        .bind(user_id)
        .bind(&pattern.recipient_identifier)
        .bind(&pattern.bank_code)
        .bind(&pattern.account_name)
        .bind(&pattern.nicknames)
        .bind(&amounts)
        .bind(i32::try_from(pattern.use_count).unwrap_or(i32::MAX))
        .bind(pattern.last_used_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unavailable("save recipient pattern", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_failure_is_a_database_error() {
        let error = decode_failed("nicknames", sqlx::Error::ColumnNotFound("nicknames".into()));
        match error {
            EngineError::DatabaseError(detail) => {
                assert!(detail.contains("recipient_patterns.nicknames"));
            }
            other => panic!("expected a database error, got {:?}", other),
        }
    }
}
