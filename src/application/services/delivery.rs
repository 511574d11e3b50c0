use async_trait::async_trait;

/// The third-party endpoint that actually delivers a text.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Sends `content` to `to` and returns the external delivery identifier.
    async fn send(&self, to: &str, content: &str) -> anyhow::Result<String>;
}
