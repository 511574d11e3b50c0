use std::sync::Arc;

use anyhow::Context;

use crate::{
    application::{
        services::event_bus::{MessageBus, PublishOutcome},
        usecases::select_unsent::SelectUnsentUseCase,
    },
    domain::{events::DispatchTask, models::MessageId},
};

#[derive(Debug, Clone)]
pub struct ProcessMessagesConfig {
    pub batch_size: u32,
    pub max_attempts: u32,
}

impl Default for ProcessMessagesConfig {
    fn default() -> Self {
        Self {
            batch_size: 2,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    NothingToDo,
    Queued {
        queued: Vec<MessageId>,
        duplicates: Vec<MessageId>,
    },
}

/// One trigger run: select a batch of unsent messages and enqueue a task for each.
pub struct ProcessMessagesUseCase {
    selector: SelectUnsentUseCase,
    bus: Arc<dyn MessageBus>,
    config: ProcessMessagesConfig,
}

impl ProcessMessagesUseCase {
    pub fn new(
        selector: SelectUnsentUseCase,
        bus: Arc<dyn MessageBus>,
        config: ProcessMessagesConfig,
    ) -> Self {
        Self {
            selector,
            bus,
            config,
        }
    }

    pub async fn execute(&self) -> anyhow::Result<ProcessOutcome> {
        let messages = self
            .selector
            .execute(self.config.batch_size)
            .await
            .context("failed to select unsent messages")?;

        if messages.is_empty() {
            tracing::info!("no unsent messages found");
            return Ok(ProcessOutcome::NothingToDo);
        }

        tracing::info!(count = messages.len(), "found messages to process");

        let mut queued = Vec::with_capacity(messages.len());
        let mut duplicates = Vec::new();
        for message in messages {
            let id = message.id;
            match self
                .bus
                .publish(DispatchTask::new(message, self.config.max_attempts))
                .await?
            {
                PublishOutcome::Enqueued => {
                    tracing::info!(message_id = id, "queued message");
                    queued.push(id);
                }
                PublishOutcome::Duplicate => {
                    tracing::debug!(message_id = id, "message already queued");
                    duplicates.push(id);
                }
            }
        }

        Ok(ProcessOutcome::Queued { queued, duplicates })
    }
}
