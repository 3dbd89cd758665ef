//! Postgres chat sink. Replies land in `chat_messages`; delivery to
//! connected clients is the chat service's concern.

use sqlx::PgPool;
use uuid::Uuid;

use crate::services::StoreError;
use crate::services::chat::ChatSink;
use crate::state::now_ms;

/// Author recorded on every agent reply.
pub const ASSISTANT_AUTHOR: &str = "assistant";

pub struct PgChatSink {
    pool: PgPool,
}

impl PgChatSink {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ChatSink for PgChatSink {
    async fn post_assistant_message(&self, canvas_id: Uuid, text: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO chat_messages (id, canvas_id, author, text, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(Uuid::new_v4())
            .bind(canvas_id)
            .bind(ASSISTANT_AUTHOR)
            .bind(text)
            .bind(now_ms())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
