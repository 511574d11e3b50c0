use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::message::{Message, MessageId};

/// Denormalized projection written to the result cache after a send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub message_id: String,
    pub record_id: String,
    pub sent_at: String,
}

impl DeliveryResult {
    pub fn cache_key(id: MessageId) -> String {
        format!("message:{id}")
    }

    pub fn from_message(message: &Message) -> Option<Self> {
        let delivery = message.delivery.as_ref()?;
        Some(Self {
            message_id: delivery.message_id.clone(),
            record_id: delivery.message_id.clone(),
            sent_at: iso8601(delivery.sent_at),
        })
    }
}

pub fn iso8601(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, false)
}
