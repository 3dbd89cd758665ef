//! Chat sink — where the agent's replies go.

use std::sync::Mutex;

use uuid::Uuid;

use super::StoreError;

#[async_trait::async_trait]
pub trait ChatSink: Send + Sync {
    /// Post a message authored by the assistant into the canvas chat.
    async fn post_assistant_message(&self, canvas_id: Uuid, text: &str) -> Result<(), StoreError>;
}

/// Collects messages in memory. Used by tests and embedders that relay
/// messages themselves.
#[derive(Default)]
pub struct MemoryChatSink {
    messages: Mutex<Vec<(Uuid, String)>>,
}

impl MemoryChatSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages posted to `canvas_id`, oldest first.
    #[must_use]
    pub fn messages(&self, canvas_id: Uuid) -> Vec<String> {
        let messages = self.messages.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        messages
            .iter()
            .filter(|(id, _)| *id == canvas_id)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl ChatSink for MemoryChatSink {
    async fn post_assistant_message(&self, canvas_id: Uuid, text: &str) -> Result<(), StoreError> {
        let mut messages = self.messages.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        messages.push((canvas_id, text.to_string()));
        Ok(())
    }
}
