//! canvas-agent — chat text to validated, undoable canvas mutations.
//!
//! ARCHITECTURE
//! ============
//! Chat messages land in a per-canvas command queue. One consumer per canvas
//! claims each command, asks the language model what it means (classify, then
//! normalize or plan), falls back to a deterministic parser when the model is
//! unhelpful, resolves selectors against the canvas, checks guardrails, and
//! executes validated primitives that are logged for exact undo.
//!
//! Storage, chat delivery and the model endpoint are collaborators behind
//! traits; `services` ships in-memory implementations and `db` ships the
//! Postgres ones.

pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod services;
pub mod state;
