//! Domain services for the command pipeline.
//!
//! ARCHITECTURE
//! ============
//! Leaf services (`canvas`, `chat`, `queue`, `history`) define the store
//! traits the agent depends on together with in-memory implementations.
//! `executor`, `layout`, `selector` and `guardrail` are deterministic; `action`,
//! `oracle` and `fallback` turn text into actions; `orchestrator` wires the
//! pipeline and owns the per-canvas consumer loop.

pub mod action;
pub mod canvas;
pub mod chat;
pub mod executor;
pub mod fallback;
pub mod guardrail;
pub mod history;
pub mod layout;
pub mod oracle;
pub mod orchestrator;
pub mod queue;
pub mod selector;

use uuid::Uuid;

/// Failure of a backing store. Always an infrastructure problem, never a
/// validation result.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl crate::error::ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
            Self::Serialization(_) => "E_SERIALIZATION",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}
