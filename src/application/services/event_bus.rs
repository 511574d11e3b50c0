use async_trait::async_trait;

use crate::domain::events::DispatchTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Enqueued,
    /// A task for the same message is already queued or in flight.
    Duplicate,
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, task: DispatchTask) -> anyhow::Result<PublishOutcome>;
}
