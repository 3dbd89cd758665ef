//! Postgres command history. Entries are stored whole as JSONB; `seq`
//! breaks timestamp ties in insertion order.

use sqlx::PgPool;
use uuid::Uuid;

use super::sql_limit;
use crate::services::StoreError;
use crate::services::history::{CommandLogEntry, HistoryStore};

pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl HistoryStore for PgHistoryStore {
    async fn append(&self, entry: &CommandLogEntry) -> Result<(), StoreError> {
        let body = serde_json::to_value(entry)?;
        sqlx::query("INSERT INTO command_history (id, canvas_id, ts, command_type, entry) VALUES ($1, $2, $3, $4, $5)")
            .bind(entry.id)
            .bind(entry.canvas_id)
            .bind(entry.timestamp)
            .bind(&entry.command_type)
            .bind(body)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn last_n(&self, canvas_id: Uuid, n: usize) -> Result<Vec<CommandLogEntry>, StoreError> {
        let rows: Vec<serde_json::Value> = sqlx::query_scalar(
            "SELECT entry FROM command_history WHERE canvas_id = $1 ORDER BY ts DESC, seq DESC LIMIT $2",
        )
        .bind(canvas_id)
        .bind(sql_limit(n))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|v| serde_json::from_value(v).map_err(StoreError::from))
            .collect()
    }
}
