use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::{
    application::services::result_cache::ResultCache,
    domain::models::{DeliveryResult, MessageId},
};

#[derive(Default, Clone)]
pub struct InMemoryResultCache {
    entries: Arc<RwLock<HashMap<String, (DeliveryResult, Instant)>>>,
}

impl InMemoryResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries.values().filter(|(_, expires)| *expires > now).count()
    }
}

#[async_trait]
impl ResultCache for InMemoryResultCache {
    async fn put(
        &self,
        id: MessageId,
        result: &DeliveryResult,
        ttl: Duration,
    ) -> anyhow::Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, expires)| *expires > now);
        entries.insert(DeliveryResult::cache_key(id), (result.clone(), now + ttl));
        Ok(())
    }

    async fn get(&self, id: MessageId) -> anyhow::Result<Option<DeliveryResult>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&DeliveryResult::cache_key(id))
            .filter(|(_, expires)| *expires > Instant::now())
            .map(|(result, _)| result.clone()))
    }
}
