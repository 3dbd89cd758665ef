//! Postgres command queue.
//!
//! The claim is a single conditional `UPDATE ... WHERE status = $from`, so
//! competing consumers in different processes cannot both win it. A trigger
//! publishes the canvas id of every inserted or updated row on the
//! `command_queue` channel; `spawn_listener` forwards those into the local
//! broadcast that consumers subscribe to.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use super::sql_limit;
use crate::services::StoreError;
use crate::services::queue::{CommandStatus, QueueStore, QueuedCommand};

/// Postgres notification channel written by the queue trigger.
pub const NOTIFY_CHANNEL: &str = "command_queue";

const NOTIFY_CAPACITY: usize = 256;
const LISTEN_RETRY: Duration = Duration::from_secs(1);

type QueueRow = (Uuid, Uuid, Uuid, String, String, String, i64, Option<String>);

const SELECT_COLUMNS: &str =
    "SELECT id, canvas_id, user_id, display_name, text, status, enqueued_at, error_message FROM command_queue";

pub struct PgQueueStore {
    pool: PgPool,
    notify: broadcast::Sender<Uuid>,
}

impl PgQueueStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let (notify, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self { pool, notify }
    }

    /// Forward `command_queue` notifications to subscribers until the
    /// process exits. Connection failures are retried; `PgListener`
    /// re-subscribes on reconnect.
    pub fn spawn_listener(&self) -> JoinHandle<()> {
        let pool = self.pool.clone();
        let notify = self.notify.clone();
        tokio::spawn(async move {
            loop {
                match listen(&pool, &notify).await {
                    Ok(()) => return,
                    Err(e) => {
                        warn!(error = %e, "queue: listener failed; retrying");
                        tokio::time::sleep(LISTEN_RETRY).await;
                    }
                }
            }
        })
    }
}

async fn listen(pool: &PgPool, notify: &broadcast::Sender<Uuid>) -> Result<(), sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(NOTIFY_CHANNEL).await?;
    info!(channel = NOTIFY_CHANNEL, "queue: listening for changes");
    loop {
        let notification = listener.recv().await?;
        match notification.payload().parse::<Uuid>() {
            Ok(canvas_id) => {
                let _ = notify.send(canvas_id);
            }
            Err(_) => warn!(payload = notification.payload(), "queue: ignoring malformed notification"),
        }
    }
}

pub(crate) fn row_to_command(row: QueueRow) -> Result<QueuedCommand, StoreError> {
    let (id, canvas_id, user_id, display_name, text, status, enqueued_at, error_message) = row;
    let status = CommandStatus::parse(&status)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown command status: {status}").into()))?;
    Ok(QueuedCommand { id, canvas_id, user_id, display_name, text, status, enqueued_at, error_message })
}

#[async_trait::async_trait]
impl QueueStore for PgQueueStore {
    async fn append(&self, command: &QueuedCommand) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO command_queue \
             (id, canvas_id, user_id, display_name, text, status, enqueued_at, error_message) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(command.id)
        .bind(command.canvas_id)
        .bind(command.user_id)
        .bind(&command.display_name)
        .bind(&command.text)
        .bind(command.status.as_str())
        .bind(command.enqueued_at)
        .bind(&command.error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_queued(&self, canvas_id: Uuid, limit: usize) -> Result<Vec<QueuedCommand>, StoreError> {
        let rows = sqlx::query_as::<_, QueueRow>(&format!(
            "{SELECT_COLUMNS} WHERE canvas_id = $1 AND status = 'queued' ORDER BY enqueued_at ASC, id ASC LIMIT $2"
        ))
        .bind(canvas_id)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_command).collect()
    }

    async fn transition(
        &self,
        id: Uuid,
        from: CommandStatus,
        to: CommandStatus,
        error_message: Option<&str>,
    ) -> Result<bool, StoreError> {
        if !from.may_advance_to(to) {
            return Ok(false);
        }
        let result = sqlx::query(
            "UPDATE command_queue SET status = $3, error_message = COALESCE($4, error_message) \
             WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM command_queue WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<QueuedCommand>, StoreError> {
        let row = sqlx::query_as::<_, QueueRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_command).transpose()
    }

    fn subscribe(&self) -> broadcast::Receiver<Uuid> {
        self.notify.subscribe()
    }
}

#[cfg(test)]
#[path = "queue_test.rs"]
mod tests;
