use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, Semaphore, mpsc};
use tokio::task::JoinHandle;

use crate::{
    application::{
        handlers::message_dispatcher::{DeliveryOutcome, MessageDispatchHandler},
        services::{
            event_bus::{MessageBus, PublishOutcome},
            rate_limiter::RateLimiter,
        },
    },
    domain::{errors::DeliveryError, events::DispatchTask, models::MessageId},
};

#[derive(Debug, Clone)]
pub struct DispatchQueueConfig {
    pub workers: usize,
    pub retry_backoff: Duration,
    pub retry_backoff_max: Duration,
}

impl Default for DispatchQueueConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            retry_backoff: Duration::from_secs(1),
            retry_backoff_max: Duration::from_secs(30),
        }
    }
}

impl DispatchQueueConfig {
    /// `base * 2^(attempt - 1)`, capped at the configured maximum.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.retry_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.retry_backoff_max)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub sent: u64,
    pub already_sent: u64,
    pub retried: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    sent: AtomicU64,
    already_sent: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
}

struct Shared {
    sender: mpsc::UnboundedSender<DispatchTask>,
    limiter: Arc<RateLimiter>,
    handler: Arc<MessageDispatchHandler>,
    workers: Arc<Semaphore>,
    // message ids queued, in flight, or waiting for a retry
    pending: Mutex<HashSet<MessageId>>,
    idle: Notify,
    closing: AtomicBool,
    counters: Counters,
    config: DispatchQueueConfig,
}

/// In-process work queue that admits send tasks through a shared rate limiter.
///
/// A single dispatcher loop pulls tasks in enqueue order, waits for a free
/// worker, then for a rate-limit admission, and only then starts the delivery.
/// Retryable failures go back to the tail of the queue after a backoff and
/// compete for a fresh admission.
pub struct DispatchQueue {
    shared: Arc<Shared>,
    dispatcher: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl DispatchQueue {
    pub fn start(
        config: DispatchQueueConfig,
        limiter: Arc<RateLimiter>,
        handler: Arc<MessageDispatchHandler>,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let workers = config.workers.max(1);
        let shared = Arc::new(Shared {
            sender,
            limiter,
            handler,
            workers: Arc::new(Semaphore::new(workers)),
            pending: Mutex::new(HashSet::new()),
            idle: Notify::new(),
            closing: AtomicBool::new(false),
            counters: Counters::default(),
            config: DispatchQueueConfig { workers, ..config },
        });

        let dispatcher = tokio::spawn(Shared::run(shared.clone(), receiver));

        Arc::new(Self {
            shared,
            dispatcher: std::sync::Mutex::new(Some(dispatcher)),
        })
    }

    pub fn stats(&self) -> DispatchStats {
        let counters = &self.shared.counters;
        DispatchStats {
            sent: counters.sent.load(Ordering::Relaxed),
            already_sent: counters.already_sent.load(Ordering::Relaxed),
            retried: counters.retried.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Resolves once every enqueued task reached a final outcome.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.shared.pending.lock().await.is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Stops admitting work and waits for in-flight deliveries to finish.
    /// Queued tasks and scheduled retries are abandoned.
    pub async fn shutdown(&self) {
        self.shared.closing.store(true, Ordering::SeqCst);

        let handle = match self.dispatcher.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }

        // every slot back means no delivery is still running
        let slots = self.shared.config.workers as u32;
        match self.shared.workers.acquire_many(slots).await {
            Ok(permits) => {
                permits.forget();
                self.shared.workers.close();
            }
            Err(_) => return,
        }

        let abandoned = {
            let mut pending = self.shared.pending.lock().await;
            let count = pending.len();
            pending.clear();
            count
        };
        self.shared.idle.notify_waiters();
        tracing::info!(abandoned, "dispatch queue stopped");
    }
}

#[async_trait]
impl MessageBus for DispatchQueue {
    async fn publish(&self, task: DispatchTask) -> anyhow::Result<PublishOutcome> {
        if self.shared.closing.load(Ordering::SeqCst) {
            anyhow::bail!("dispatch queue is shutting down");
        }

        let id = task.message_id();
        if !self.shared.pending.lock().await.insert(id) {
            return Ok(PublishOutcome::Duplicate);
        }

        if self.shared.sender.send(task).is_err() {
            self.shared.settle(id).await;
            anyhow::bail!("dispatch queue is closed");
        }
        Ok(PublishOutcome::Enqueued)
    }
}

impl Shared {
    async fn run(self: Arc<Self>, mut receiver: mpsc::UnboundedReceiver<DispatchTask>) {
        while let Some(task) = receiver.recv().await {
            if self.closing.load(Ordering::SeqCst) {
                self.settle(task.message_id()).await;
                continue;
            }

            let Ok(permit) = self.workers.clone().acquire_owned().await else {
                return;
            };
            let admitted_at = self.limiter.acquire().await;
            tracing::debug!(
                task_id = %task.task_id,
                message_id = task.message_id(),
                attempt = task.attempt,
                admitted_at = ?admitted_at,
                "task admitted"
            );

            let shared = self.clone();
            tokio::spawn(async move {
                shared.execute(task).await;
                drop(permit);
            });
        }
    }

    async fn execute(self: Arc<Self>, task: DispatchTask) {
        let id = task.message_id();
        let result = self.handler.handle(&task).await;
        match result {
            Ok(DeliveryOutcome::Sent { .. }) => {
                self.counters.sent.fetch_add(1, Ordering::Relaxed);
                self.settle(id).await;
            }
            Ok(DeliveryOutcome::AlreadySent { .. }) => {
                self.counters.already_sent.fetch_add(1, Ordering::Relaxed);
                self.settle(id).await;
            }
            Err(err) if err.is_retryable() && task.has_attempts_left() => {
                self.counters.retried.fetch_add(1, Ordering::Relaxed);
                let delay = self.config.backoff_for(task.attempt);
                tracing::warn!(
                    task_id = %task.task_id,
                    message_id = id,
                    attempt = task.attempt,
                    max_attempts = task.max_attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %err,
                    "delivery failed, scheduling retry"
                );
                self.schedule_retry(task.next_attempt(), delay);
            }
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                Self::on_terminal_failure(&task, &err);
                self.settle(id).await;
            }
        }
    }

    fn schedule_retry(self: Arc<Self>, task: DispatchTask, delay: Duration) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let id = task.message_id();
            if self.closing.load(Ordering::SeqCst) {
                tracing::info!(message_id = id, "queue closing, retry abandoned");
                self.settle(id).await;
                return;
            }
            if self.sender.send(task).is_err() {
                self.settle(id).await;
            }
        });
    }

    fn on_terminal_failure(task: &DispatchTask, err: &DeliveryError) {
        tracing::error!(
            task_id = %task.task_id,
            message_id = task.message_id(),
            attempt = task.attempt,
            retryable = err.is_retryable(),
            error = %err,
            "job failed for message"
        );
    }

    async fn settle(&self, id: MessageId) {
        let mut pending = self.pending.lock().await;
        pending.remove(&id);
        if pending.is_empty() {
            self.idle.notify_waiters();
        }
    }
}
