use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};

use crate::{
    application::{
        handlers::message_dispatcher::{DispatchHandlerConfig, MessageDispatchHandler},
        services::{
            delivery::DeliveryClient,
            rate_limiter::{RateLimitConfig, RateLimiter},
            result_cache::ResultCache,
        },
        usecases::{
            list_sent_messages::ListSentMessagesUseCase,
            process_messages::{ProcessMessagesConfig, ProcessMessagesUseCase},
            select_unsent::SelectUnsentUseCase,
        },
    },
    config::Config,
    domain::repositories::MessageRepository,
    infrastructure::messaging::dispatch_queue::{DispatchQueue, DispatchQueueConfig},
    presentation::http::endpoints::root::ApiState,
};

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub handler: DispatchHandlerConfig,
    pub queue: DispatchQueueConfig,
    pub rate_limit: RateLimitConfig,
    pub process: ProcessMessagesConfig,
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            handler: config.dispatch_handler(),
            queue: config.dispatch_queue(),
            rate_limit: config.rate_limit,
            process: config.process_messages(),
        }
    }
}

/// Selector, dispatch queue and delivery worker wired over one store.
pub struct Pipeline {
    pub queue: Arc<DispatchQueue>,
    pub processor: ProcessMessagesUseCase,
    pub list_sent: Arc<ListSentMessagesUseCase>,
}

impl Pipeline {
    pub fn new(
        repo: Arc<dyn MessageRepository>,
        client: Arc<dyn DeliveryClient>,
        cache: Arc<dyn ResultCache>,
        config: PipelineConfig,
    ) -> Self {
        let handler = Arc::new(MessageDispatchHandler::new(
            repo.clone(),
            client,
            cache,
            config.handler,
        ));
        let limiter = Arc::new(RateLimiter::new(config.rate_limit));
        let queue = DispatchQueue::start(config.queue, limiter, handler);
        let processor = ProcessMessagesUseCase::new(
            SelectUnsentUseCase::new(repo.clone()),
            queue.clone(),
            config.process,
        );

        Self {
            queue,
            processor,
            list_sent: Arc::new(ListSentMessagesUseCase::new(repo)),
        }
    }

    pub fn api_state(&self) -> Arc<ApiState> {
        Arc::new(ApiState {
            list_sent_messages_usecase: self.list_sent.clone(),
        })
    }

    /// Runs the trigger forever. A failed run is logged and the next tick tries again.
    pub async fn run_periodic(&self, every: Duration) {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = self.processor.execute().await {
                tracing::error!(error = %err, "message processing run failed");
            }
        }
    }
}
