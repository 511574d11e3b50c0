use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::models::{MarkSent, Message, MessageId, NewMessage};

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, message: NewMessage) -> anyhow::Result<Message>;

    async fn get(&self, id: MessageId) -> anyhow::Result<Option<Message>>;

    /// Unsent messages in ascending id order, at most `limit` of them.
    async fn find_unsent(&self, limit: u32) -> anyhow::Result<Vec<Message>>;

    /// Sets the delivery fields in one update, only if the message is still unsent.
    async fn mark_sent(
        &self,
        id: MessageId,
        external_id: &str,
        sent_at: DateTime<Utc>,
    ) -> anyhow::Result<Option<MarkSent>>;

    /// Sent messages, most recently sent first.
    async fn list_sent(&self) -> anyhow::Result<Vec<Message>>;
}
