use std::sync::Arc;

use crate::domain::{models::Message, repositories::MessageRepository};

pub struct SelectUnsentUseCase {
    repo: Arc<dyn MessageRepository>,
}

impl SelectUnsentUseCase {
    pub fn new(repo: Arc<dyn MessageRepository>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self, limit: u32) -> anyhow::Result<Vec<Message>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.repo.find_unsent(limit).await
    }
}
