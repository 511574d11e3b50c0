use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::{
    application::services::{
        delivery::DeliveryClient,
        result_cache::{DEFAULT_RESULT_TTL, ResultCache},
    },
    domain::{
        errors::DeliveryError,
        events::DispatchTask,
        models::{DeliveryResult, MarkSent, Message},
        repositories::MessageRepository,
    },
};

pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 1000;
pub const DEFAULT_CACHE_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct DispatchHandlerConfig {
    pub max_content_length: usize,
    pub result_ttl: Duration,
    /// Upper bound for the detached cache write after a successful send.
    pub cache_write_timeout: Duration,
}

impl Default for DispatchHandlerConfig {
    fn default() -> Self {
        Self {
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            result_ttl: DEFAULT_RESULT_TTL,
            cache_write_timeout: DEFAULT_CACHE_WRITE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent { external_id: String },
    /// Another attempt already committed; nothing was sent this time.
    AlreadySent { external_id: String },
}

pub struct MessageDispatchHandler {
    repo: Arc<dyn MessageRepository>,
    client: Arc<dyn DeliveryClient>,
    cache: Arc<dyn ResultCache>,
    config: DispatchHandlerConfig,
}

impl MessageDispatchHandler {
    pub fn new(
        repo: Arc<dyn MessageRepository>,
        client: Arc<dyn DeliveryClient>,
        cache: Arc<dyn ResultCache>,
        config: DispatchHandlerConfig,
    ) -> Self {
        Self {
            repo,
            client,
            cache,
            config,
        }
    }

    pub async fn handle(&self, task: &DispatchTask) -> Result<DeliveryOutcome, DeliveryError> {
        tracing::info!(
            task_id = %task.task_id,
            message_id = task.message_id(),
            attempt = task.attempt,
            max_attempts = task.max_attempts,
            "processing message"
        );
        self.deliver(&task.message).await
    }

    pub async fn deliver(&self, message: &Message) -> Result<DeliveryOutcome, DeliveryError> {
        // the queued snapshot may be stale after a redelivery
        let current = self
            .repo
            .get(message.id)
            .await
            .map_err(DeliveryError::StoreUnavailable)?
            .ok_or(DeliveryError::NotFound(message.id))?;

        if let Some(delivery) = &current.delivery {
            tracing::info!(
                message_id = current.id,
                external_message_id = %delivery.message_id,
                "message already sent, skipping"
            );
            return Ok(DeliveryOutcome::AlreadySent {
                external_id: delivery.message_id.clone(),
            });
        }

        let length = current.content_len();
        if length > self.config.max_content_length {
            tracing::error!(
                message_id = current.id,
                content_length = length,
                max = self.config.max_content_length,
                "message content exceeds character limit"
            );
            return Err(DeliveryError::ContentTooLong {
                length,
                max: self.config.max_content_length,
            });
        }

        let external_id = match self
            .client
            .send(&current.phone_number, &current.content)
            .await
        {
            Ok(id) => id,
            Err(err) => {
                let reason = format!("{err:#}");
                tracing::warn!(message_id = current.id, error = %reason, "failed to send message");
                return Err(DeliveryError::DeliveryFailed(reason));
            }
        };

        let marked = self
            .repo
            .mark_sent(current.id, &external_id, Utc::now())
            .await
            .map_err(DeliveryError::StoreUnavailable)?
            .ok_or(DeliveryError::NotFound(current.id))?;

        let sent = match marked {
            MarkSent::Updated(sent) => sent,
            MarkSent::AlreadySent(existing) => {
                tracing::warn!(
                    message_id = existing.id,
                    external_message_id = %external_id,
                    "message was marked sent by a concurrent attempt"
                );
                return Ok(DeliveryOutcome::AlreadySent {
                    external_id: existing.external_id().unwrap_or_default().to_string(),
                });
            }
        };

        self.populate_cache(&sent);

        tracing::info!(
            message_id = sent.id,
            external_message_id = %external_id,
            "message sent successfully"
        );
        Ok(DeliveryOutcome::Sent { external_id })
    }

    /// Writes the result in a detached task; the outcome never reaches the caller.
    fn populate_cache(&self, message: &Message) {
        let Some(result) = DeliveryResult::from_message(message) else {
            return;
        };
        let cache = self.cache.clone();
        let id = message.id;
        let ttl = self.config.result_ttl;
        let limit = self.config.cache_write_timeout;

        tokio::spawn(async move {
            match tokio::time::timeout(limit, cache.put(id, &result, ttl)).await {
                Ok(Ok(())) => tracing::debug!(message_id = id, "delivery result cached"),
                Ok(Err(err)) => {
                    let reason = format!("{err:#}");
                    tracing::warn!(message_id = id, error = %reason, "result cache write failed");
                }
                Err(_) => tracing::warn!(
                    message_id = id,
                    timeout_ms = limit.as_millis() as u64,
                    "result cache write timed out"
                ),
            }
        });
    }
}
