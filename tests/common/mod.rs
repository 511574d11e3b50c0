#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use messaging::{
    application::services::{delivery::DeliveryClient, result_cache::ResultCache},
    domain::{
        models::{DeliveryResult, Message, MessageId, NewMessage},
        repositories::MessageRepository,
    },
    infrastructure::repositories::in_memory::InMemoryMessageRepository,
};

/// Delivery endpoint double: replays scripted replies, then answers `default_id`.
pub struct StubClient {
    script: Mutex<VecDeque<Result<String, String>>>,
    default_id: String,
    calls: Mutex<Vec<(String, String, Instant)>>,
}

impl StubClient {
    pub fn answering(id: &str) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            default_id: id.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn scripted(replies: Vec<Result<&str, &str>>, then: &str) -> Arc<Self> {
        let script = replies
            .into_iter()
            .map(|reply| reply.map(str::to_string).map_err(str::to_string))
            .collect();
        Arc::new(Self {
            script: Mutex::new(script),
            default_id: then.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Self::scripted(vec![Err(reason); 64], "unreachable")
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, _, at)| *at).collect()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(to, _, _)| to.clone())
            .collect()
    }
}

#[async_trait]
impl DeliveryClient for StubClient {
    async fn send(&self, to: &str, content: &str) -> anyhow::Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((to.to_string(), content.to_string(), Instant::now()));
        let reply = self.script.lock().unwrap().pop_front();
        match reply {
            Some(Ok(id)) => Ok(id),
            Some(Err(reason)) => anyhow::bail!(reason),
            None => Ok(self.default_id.clone()),
        }
    }
}

pub struct BrokenCache;

#[async_trait]
impl ResultCache for BrokenCache {
    async fn put(&self, _: MessageId, _: &DeliveryResult, _: Duration) -> anyhow::Result<()> {
        anyhow::bail!("connection refused")
    }

    async fn get(&self, _: MessageId) -> anyhow::Result<Option<DeliveryResult>> {
        anyhow::bail!("connection refused")
    }
}

/// A cache whose writes never complete.
pub struct HangingCache;

#[async_trait]
impl ResultCache for HangingCache {
    async fn put(&self, _: MessageId, _: &DeliveryResult, _: Duration) -> anyhow::Result<()> {
        std::future::pending().await
    }

    async fn get(&self, _: MessageId) -> anyhow::Result<Option<DeliveryResult>> {
        Ok(None)
    }
}

/// Polls until the detached cache write lands.
pub async fn cached_result(cache: &dyn ResultCache, id: MessageId) -> Option<DeliveryResult> {
    for _ in 0..100 {
        if let Some(result) = cache.get(id).await.unwrap() {
            return Some(result);
        }
        tokio::task::yield_now().await;
    }
    None
}

pub async fn store_with(contents: &[&str]) -> (Arc<InMemoryMessageRepository>, Vec<Message>) {
    let repo = Arc::new(InMemoryMessageRepository::new());
    let mut created = Vec::new();
    for (i, content) in contents.iter().enumerate() {
        created.push(
            repo.create(NewMessage::new(format!("+9055500000{i:02}"), *content))
                .await
                .unwrap(),
        );
    }
    (repo, created)
}

/// `is_sent ⟺ message_id set ⟺ sent_at set`, checked on every stored row.
pub async fn assert_delivery_invariant(repo: &InMemoryMessageRepository, ids: &[MessageId]) {
    for id in ids {
        let message = repo.get(*id).await.unwrap().unwrap();
        assert_eq!(message.is_sent(), message.external_id().is_some());
        assert_eq!(message.is_sent(), message.sent_at().is_some());
    }
}
