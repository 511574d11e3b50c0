use std::sync::Arc;

use crate::domain::{
    models::{Message, NewMessage},
    repositories::MessageRepository,
};

pub struct SeedMessagesUseCase {
    repo: Arc<dyn MessageRepository>,
}

impl SeedMessagesUseCase {
    pub fn new(repo: Arc<dyn MessageRepository>) -> Self {
        Self { repo }
    }

    pub fn samples() -> Vec<NewMessage> {
        vec![
            NewMessage::new("+905551111111", "Insider - Project"),
            NewMessage::new("+905552222222", "Welcome to the Message Sending System!"),
            NewMessage::new("+905553333333", "Your message has been queued for delivery."),
        ]
    }

    pub async fn execute(&self, messages: Vec<NewMessage>) -> anyhow::Result<Vec<Message>> {
        let mut created = Vec::with_capacity(messages.len());
        for message in messages {
            if message.phone_number.trim().is_empty() {
                anyhow::bail!("phone number must not be empty");
            }
            created.push(self.repo.create(message).await?);
        }
        Ok(created)
    }
}
