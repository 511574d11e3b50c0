use std::time::Duration;

use async_trait::async_trait;

use crate::domain::models::{DeliveryResult, MessageId};

pub const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Best-effort side channel. Nothing may depend on an entry being present.
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn put(&self, id: MessageId, result: &DeliveryResult, ttl: Duration)
    -> anyhow::Result<()>;

    async fn get(&self, id: MessageId) -> anyhow::Result<Option<DeliveryResult>>;
}
