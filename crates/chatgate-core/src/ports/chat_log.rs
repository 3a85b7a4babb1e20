//! Chat log port.

use async_trait::async_trait;

use crate::domain::ChatExchange;
use crate::error::StoreError;

/// Durable per-day log of relayed exchanges.
#[async_trait]
pub trait ChatLogRecorder: Send + Sync {
    /// Appends `exchange` to today's log, threaded after `parent_message_id`
    /// when a thread ends with that reply.
    async fn record(
        &self,
        exchange: ChatExchange,
        parent_message_id: Option<&str>,
    ) -> Result<(), StoreError>;
}
