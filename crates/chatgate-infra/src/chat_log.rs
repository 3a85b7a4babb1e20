//! Chat log recorder backed by the day-partitioned `chat` document.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use chatgate_core::domain::{ChatExchange, ChatLog};
use chatgate_core::error::StoreError;
use chatgate_core::ports::ChatLogRecorder;

use crate::store::{DocumentLocation, JsonDocumentStore};

pub const CHAT_LOG_DOCUMENT: &str = "chat";

pub struct JsonChatLogRecorder {
    store: Arc<JsonDocumentStore>,
    location: DocumentLocation,
}

impl JsonChatLogRecorder {
    pub fn new(store: Arc<JsonDocumentStore>, dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            location: DocumentLocation::day_partitioned(dir, CHAT_LOG_DOCUMENT),
        }
    }

    /// Today's log.
    pub async fn snapshot(&self) -> Result<ChatLog, StoreError> {
        let document = self.store.acquire::<ChatLog>(&self.location).await?;
        Ok(document.read(Clone::clone).await)
    }
}

#[async_trait]
impl ChatLogRecorder for JsonChatLogRecorder {
    async fn record(
        &self,
        exchange: ChatExchange,
        parent_message_id: Option<&str>,
    ) -> Result<(), StoreError> {
        let document = self.store.acquire::<ChatLog>(&self.location).await?;
        let threaded = document
            .update(|log| log.append(exchange, parent_message_id))
            .await;

        tracing::debug!(threaded = threaded, "Chat exchange logged");
        document.persist().await
    }
}
