//! Command queue — ordered intake of chat-originated commands.
//!
//! DESIGN
//! ======
//! Each chat send appends a `queued` record. A single consumer per canvas
//! takes the oldest queued record and claims it with a conditional
//! transition (`queued → executing` only if the record is still `queued`),
//! so two consumers observing the same record cannot both process it.
//! Status only moves forward; terminal records are deleted after a short
//! display delay so observers can render the outcome first.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use super::StoreError;
use crate::state::now_ms;

const NOTIFY_CAPACITY: usize = 256;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Queued,
    Executing,
    Complete,
    Failed,
}

impl CommandStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Executing => "executing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "queued" => Some(Self::Queued),
            "executing" => Some(Self::Executing),
            "complete" => Some(Self::Complete),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Forward-only lifecycle: `queued → executing → {complete | failed}`.
    #[must_use]
    pub fn may_advance_to(self, next: Self) -> bool {
        matches!((self, next), (Self::Queued, Self::Executing) | (Self::Executing, Self::Complete | Self::Failed))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedCommand {
    pub id: Uuid,
    pub canvas_id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub text: String,
    pub status: CommandStatus,
    pub enqueued_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

// =============================================================================
// STORE
// =============================================================================

#[async_trait::async_trait]
pub trait QueueStore: Send + Sync {
    async fn append(&self, command: &QueuedCommand) -> Result<(), StoreError>;

    /// Up to `limit` queued records for the canvas, oldest first.
    async fn list_queued(&self, canvas_id: Uuid, limit: usize) -> Result<Vec<QueuedCommand>, StoreError>;

    /// Atomically move `id` from `from` to `to`. Returns `false` when the
    /// record is missing, is no longer in `from`, or the move is not forward.
    async fn transition(
        &self,
        id: Uuid,
        from: CommandStatus,
        to: CommandStatus,
        error_message: Option<&str>,
    ) -> Result<bool, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<QueuedCommand>, StoreError>;

    /// Change notifications carrying the canvas id of the changed record.
    fn subscribe(&self) -> broadcast::Receiver<Uuid>;
}

/// Append a new `queued` command and return its id.
///
/// # Errors
///
/// Propagates the store failure.
pub async fn enqueue(
    store: &dyn QueueStore,
    canvas_id: Uuid,
    user_id: Uuid,
    display_name: &str,
    text: &str,
) -> Result<Uuid, StoreError> {
    let command = QueuedCommand {
        id: Uuid::new_v4(),
        canvas_id,
        user_id,
        display_name: display_name.to_string(),
        text: text.to_string(),
        status: CommandStatus::Queued,
        enqueued_at: now_ms(),
        error_message: None,
    };
    store.append(&command).await?;
    info!(%canvas_id, command_id = %command.id, "queue: command enqueued");
    Ok(command.id)
}

/// Delete a terminal record after `delay`. Fire-and-forget; failures are
/// logged only.
pub fn schedule_removal(store: Arc<dyn QueueStore>, id: Uuid, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(e) = store.delete(id).await {
            warn!(error = %e, command_id = %id, "queue: deferred removal failed");
        }
    })
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// Process-local queue. The claim is atomic because check and set happen
/// under one lock.
pub struct MemoryQueueStore {
    records: Mutex<Vec<QueuedCommand>>,
    notify: broadcast::Sender<Uuid>,
}

impl MemoryQueueStore {
    #[must_use]
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self { records: Mutex::new(Vec::new()), notify }
    }

    fn records(&self) -> std::sync::MutexGuard<'_, Vec<QueuedCommand>> {
        self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for MemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl QueueStore for MemoryQueueStore {
    async fn append(&self, command: &QueuedCommand) -> Result<(), StoreError> {
        self.records().push(command.clone());
        // No receivers is fine: nobody is consuming this canvas yet.
        let _ = self.notify.send(command.canvas_id);
        Ok(())
    }

    async fn list_queued(&self, canvas_id: Uuid, limit: usize) -> Result<Vec<QueuedCommand>, StoreError> {
        let mut queued: Vec<QueuedCommand> = self
            .records()
            .iter()
            .filter(|c| c.canvas_id == canvas_id && c.status == CommandStatus::Queued)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        queued.sort_by_key(|c| c.enqueued_at);
        queued.truncate(limit);
        Ok(queued)
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
        let canvas_id = {
            let mut records = self.records();
            let Some(record) = records.iter_mut().find(|c| c.id == id) else {
                return Ok(false);
            };
            if record.status != from {
                return Ok(false);
            }
            record.status = to;
            if let Some(msg) = error_message {
                record.error_message = Some(msg.to_string());
            }
            record.canvas_id
        };
        let _ = self.notify.send(canvas_id);
        Ok(true)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.records().retain(|c| c.id != id);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<QueuedCommand>, StoreError> {
        Ok(self.records().iter().find(|c| c.id == id).cloned())
    }

    fn subscribe(&self) -> broadcast::Receiver<Uuid> {
        self.notify.subscribe()
    }
}

#[cfg(test)]
#[path = "queue_test.rs"]
mod tests;
