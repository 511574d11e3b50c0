use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::{
    application::services::result_cache::ResultCache,
    domain::models::{DeliveryResult, MessageId},
};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct RedisResultCache {
    client: redis::Client,
}

impl RedisResultCache {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        Self::connect_with_timeout(url, CONNECT_TIMEOUT).await
    }

    /// Opens the client and checks it with a PING, giving up after `limit`.
    pub async fn connect_with_timeout(url: &str, limit: Duration) -> anyhow::Result<Self> {
        tracing::info!(url = %url, "connecting to redis");
        let client = redis::Client::open(url)?;

        let pong = tokio::time::timeout(limit, async {
            let mut conn = client.get_multiplexed_async_connection().await?;
            redis::cmd("PING").query_async::<_, String>(&mut conn).await
        })
        .await
        .map_err(|_| anyhow::anyhow!("redis did not answer within {}ms", limit.as_millis()))??;
        tracing::info!(response = %pong, "redis connection established");

        Ok(Self { client })
    }
}

#[async_trait]
impl ResultCache for RedisResultCache {
    async fn put(
        &self,
        id: MessageId,
        result: &DeliveryResult,
        ttl: Duration,
    ) -> anyhow::Result<()> {
        let json = serde_json::to_string(result)?;
        let seconds = usize::try_from(ttl.as_secs().max(1))?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(DeliveryResult::cache_key(id), json, seconds)
            .await?;
        Ok(())
    }

    async fn get(&self, id: MessageId) -> anyhow::Result<Option<DeliveryResult>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let data: Option<String> = conn.get(DeliveryResult::cache_key(id)).await?;
        data.map(|json| serde_json::from_str(&json).map_err(anyhow::Error::from))
            .transpose()
    }
}
