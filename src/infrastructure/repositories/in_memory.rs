use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::{
    models::{Delivery, MarkSent, Message, MessageId, NewMessage},
    repositories::MessageRepository,
};

#[derive(Default)]
struct Table {
    next_id: MessageId,
    rows: BTreeMap<MessageId, Message>,
}

#[derive(Default, Clone)]
pub struct InMemoryMessageRepository {
    table: Arc<RwLock<Table>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn create(&self, message: NewMessage) -> anyhow::Result<Message> {
        let now = Utc::now();
        let mut table = self.table.write().await;
        table.next_id += 1;
        let entry = Message {
            id: table.next_id,
            phone_number: message.phone_number,
            content: message.content,
            delivery: None,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn get(&self, id: MessageId) -> anyhow::Result<Option<Message>> {
        let table = self.table.read().await;
        Ok(table.rows.get(&id).cloned())
    }

    async fn find_unsent(&self, limit: u32) -> anyhow::Result<Vec<Message>> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|m| !m.is_sent())
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_sent(
        &self,
        id: MessageId,
        external_id: &str,
        sent_at: DateTime<Utc>,
    ) -> anyhow::Result<Option<MarkSent>> {
        let mut table = self.table.write().await;
        let Some(entry) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        if entry.is_sent() {
            return Ok(Some(MarkSent::AlreadySent(entry.clone())));
        }
        entry.delivery = Some(Delivery {
            message_id: external_id.to_string(),
            sent_at,
        });
        entry.updated_at = sent_at;
        Ok(Some(MarkSent::Updated(entry.clone())))
    }

    async fn list_sent(&self) -> anyhow::Result<Vec<Message>> {
        let table = self.table.read().await;
        let mut sent: Vec<Message> = table.rows.values().filter(|m| m.is_sent()).cloned().collect();
        // newest first; ties broken by id so the order is stable
        sent.sort_by(|a, b| b.sent_at().cmp(&a.sent_at()).then(b.id.cmp(&a.id)));
        Ok(sent)
    }
}
