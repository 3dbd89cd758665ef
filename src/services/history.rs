//! Command history and undo ledger.
//!
//! DESIGN
//! ======
//! Every executed primitive appends exactly one `CommandLogEntry` holding
//! the ids it created, modified and deleted plus full snapshots of the
//! objects as they were before the mutation. Entries are never edited.
//!
//! Undo replays an entry backwards: created ids are deleted, snapshots are
//! written back over modified objects, and deleted objects are recreated
//! from their snapshots. `undo_last_n` walks the most recent entries newest
//! first; reversing out of order would, for example, try to restore an
//! arrangement of objects whose creation was already undone.
//!
//! Because the log is append-only, the ledger records each undo as a marker
//! entry naming the entries it reversed. Markers and the entries they name
//! are skipped when picking the next undo window, so a second "undo" walks
//! further back instead of reapplying the same reversal.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::StoreError;
use super::canvas::CanvasStore;
use crate::state::{CanvasObject, now_ms};

/// Command type of the marker entries the ledger writes after an undo.
pub const UNDO_MARKER: &str = "undo";

/// How far back the ledger scans for undo markers.
const UNDO_SCAN_LIMIT: usize = 500;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviousState {
    pub id: Uuid,
    pub state: CanvasObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandLogEntry {
    pub id: Uuid,
    pub canvas_id: Uuid,
    pub timestamp: i64,
    pub command_type: String,
    pub parameters: serde_json::Value,
    pub objects_created: Vec<Uuid>,
    pub objects_modified: Vec<Uuid>,
    pub objects_deleted: Vec<Uuid>,
    pub previous_states: Vec<PreviousState>,
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl CommandLogEntry {
    /// A successful entry with no object lists filled in yet.
    #[must_use]
    pub fn new(canvas_id: Uuid, command_type: &str, parameters: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            canvas_id,
            timestamp: now_ms(),
            command_type: command_type.to_string(),
            parameters,
            objects_created: Vec::new(),
            objects_modified: Vec::new(),
            objects_deleted: Vec::new(),
            previous_states: Vec::new(),
            status: EntryStatus::Success,
            error_message: None,
        }
    }

    fn snapshot(&self, id: Uuid) -> Option<&CanvasObject> {
        self.previous_states
            .iter()
            .find(|p| p.id == id)
            .map(|p| &p.state)
    }

    fn is_marker(&self) -> bool {
        self.command_type == UNDO_MARKER
    }

    fn undone_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.parameters
            .get("undone")
            .and_then(serde_json::Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_str().and_then(|s| s.parse::<Uuid>().ok()))
    }
}

// =============================================================================
// STORE
// =============================================================================

#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, entry: &CommandLogEntry) -> Result<(), StoreError>;

    /// The `n` most recent entries for the canvas, newest first.
    async fn last_n(&self, canvas_id: Uuid, n: usize) -> Result<Vec<CommandLogEntry>, StoreError>;
}

/// Process-local history. Insertion order breaks timestamp ties.
#[derive(Default)]
pub struct MemoryHistoryStore {
    entries: Mutex<Vec<CommandLogEntry>>,
}

impl MemoryHistoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry for the canvas, oldest first.
    #[must_use]
    pub fn entries(&self, canvas_id: Uuid) -> Vec<CommandLogEntry> {
        let entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries
            .iter()
            .filter(|e| e.canvas_id == canvas_id)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, entry: &CommandLogEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.push(entry.clone());
        Ok(())
    }

    async fn last_n(&self, canvas_id: Uuid, n: usize) -> Result<Vec<CommandLogEntry>, StoreError> {
        let mut recent = self.entries(canvas_id);
        // Reverse first so the stable sort keeps later insertions ahead on ties.
        recent.reverse();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(n);
        Ok(recent)
    }
}

// =============================================================================
// UNDO LEDGER
// =============================================================================

/// What an undo pass actually did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UndoReport {
    /// Entries reversed, in the order they were processed.
    pub entries: Vec<Uuid>,
    /// Objects that could not be recreated because no snapshot was stored.
    pub skipped: Vec<Uuid>,
}

#[derive(Clone)]
pub struct UndoLedger {
    history: Arc<dyn HistoryStore>,
    canvas: Arc<dyn CanvasStore>,
}

impl UndoLedger {
    #[must_use]
    pub fn new(history: Arc<dyn HistoryStore>, canvas: Arc<dyn CanvasStore>) -> Self {
        Self { history, canvas }
    }

    /// Append one entry.
    ///
    /// # Errors
    ///
    /// Propagates the store failure.
    pub async fn log_command(&self, entry: &CommandLogEntry) -> Result<(), StoreError> {
        self.history.append(entry).await
    }

    /// The `n` most recent raw entries, newest first.
    ///
    /// # Errors
    ///
    /// Propagates the store failure.
    pub async fn get_last_n(&self, canvas_id: Uuid, n: usize) -> Result<Vec<CommandLogEntry>, StoreError> {
        self.history.last_n(canvas_id, n).await
    }

    /// The `n` most recent entries that have not been undone, newest first.
    ///
    /// # Errors
    ///
    /// Propagates the store failure.
    pub async fn undoable_last_n(&self, canvas_id: Uuid, n: usize) -> Result<Vec<CommandLogEntry>, StoreError> {
        let scanned = self.history.last_n(canvas_id, UNDO_SCAN_LIMIT).await?;
        let undone: HashSet<Uuid> = scanned
            .iter()
            .filter(|e| e.is_marker())
            .flat_map(CommandLogEntry::undone_ids)
            .collect();
        Ok(scanned
            .into_iter()
            .filter(|e| !e.is_marker() && !undone.contains(&e.id) && e.status == EntryStatus::Success)
            .take(n)
            .collect())
    }

    /// Reverse a single entry against the canvas.
    ///
    /// # Errors
    ///
    /// Propagates canvas store failures. A missing snapshot is skipped and
    /// reported, not returned as an error.
    pub async fn undo(&self, entry: &CommandLogEntry) -> Result<Vec<Uuid>, StoreError> {
        let canvas_id = entry.canvas_id;
        let mut skipped = Vec::new();

        for id in &entry.objects_created {
            self.canvas.delete_object(canvas_id, *id).await?;
        }

        for prev in &entry.previous_states {
            if entry.objects_deleted.contains(&prev.id) {
                continue;
            }
            self.canvas.put_object(canvas_id, prev.state.clone()).await?;
        }

        for id in &entry.objects_deleted {
            let Some(snapshot) = entry.snapshot(*id) else {
                warn!(%canvas_id, object_id = %id, entry_id = %entry.id, "undo: no snapshot for deleted object; skipping");
                skipped.push(*id);
                continue;
            };
            self.canvas.add_object(canvas_id, snapshot.clone()).await?;
        }

        info!(%canvas_id, entry_id = %entry.id, command_type = %entry.command_type, "undo: entry reversed");
        Ok(skipped)
    }

    /// Reverse the `n` most recent undoable entries, newest first, then
    /// record a marker naming them.
    ///
    /// # Errors
    ///
    /// Propagates store failures. Entries reversed before the failure stay
    /// reversed but are not marked.
    pub async fn undo_last_n(&self, canvas_id: Uuid, n: usize) -> Result<UndoReport, StoreError> {
        let entries = self.undoable_last_n(canvas_id, n).await?;
        let mut report = UndoReport::default();
        for entry in &entries {
            let skipped = self.undo(entry).await?;
            report.skipped.extend(skipped);
            report.entries.push(entry.id);
        }

        if !report.entries.is_empty() {
            let marker = CommandLogEntry::new(canvas_id, UNDO_MARKER, json!({ "undone": report.entries }));
            self.log_command(&marker).await?;
        }
        info!(%canvas_id, requested = n, reversed = report.entries.len(), "undo: batch complete");
        Ok(report)
    }
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
