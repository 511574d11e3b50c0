use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type MessageId = i64;

/// External delivery bookkeeping. Present exactly when the message was sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub message_id: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub phone_number: String,
    pub content: String,
    pub delivery: Option<Delivery>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn is_sent(&self) -> bool {
        self.delivery.is_some()
    }

    pub fn external_id(&self) -> Option<&str> {
        self.delivery.as_ref().map(|d| d.message_id.as_str())
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.delivery.as_ref().map(|d| d.sent_at)
    }

    /// Content length in bytes, which is what the delivery limit is measured in.
    pub fn content_len(&self) -> usize {
        self.content.len()
    }
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub phone_number: String,
    pub content: String,
}

impl NewMessage {
    pub fn new(phone_number: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            content: content.into(),
        }
    }
}

/// Outcome of the guarded "mark as sent" update.
#[derive(Debug, Clone)]
pub enum MarkSent {
    /// This call flipped the row from unsent to sent.
    Updated(Message),
    /// The row was already sent; stored values are left as they were.
    AlreadySent(Message),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsent() -> Message {
        let now = Utc::now();
        Message {
            id: 1,
            phone_number: "+905551111111".to_string(),
            content: "Insider - Project".to_string(),
            delivery: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unsent_message_has_no_delivery_fields() {
        let message = unsent();
        assert!(!message.is_sent());
        assert_eq!(message.external_id(), None);
        assert_eq!(message.sent_at(), None);
    }

    #[test]
    fn sent_message_exposes_all_delivery_fields() {
        let sent_at = Utc::now();
        let message = Message {
            delivery: Some(Delivery {
                message_id: "abc".to_string(),
                sent_at,
            }),
            ..unsent()
        };
        assert!(message.is_sent());
        assert_eq!(message.external_id(), Some("abc"));
        assert_eq!(message.sent_at(), Some(sent_at));
    }

    #[test]
    fn content_length_counts_bytes() {
        let message = Message {
            content: "ğü".to_string(),
            ..unsent()
        };
        assert_eq!(message.content_len(), 4);
    }
}
