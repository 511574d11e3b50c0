use uuid::Uuid;

use crate::domain::models::{Message, MessageId};

/// One "send this message" unit of work on the dispatch queue.
#[derive(Debug, Clone)]
pub struct DispatchTask {
    /// Stable across retries of the same enqueue, for correlating log lines.
    pub task_id: Uuid,
    pub message: Message,
    pub attempt: u32,
    pub max_attempts: u32,
}

impl DispatchTask {
    pub fn new(message: Message, max_attempts: u32) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            message,
            attempt: 1,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn message_id(&self) -> MessageId {
        self.message.id
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempt < self.max_attempts
    }

    pub fn next_attempt(mut self) -> Self {
        self.attempt += 1;
        self
    }
}
