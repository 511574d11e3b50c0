mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;

use messaging::{
    application::{
        handlers::message_dispatcher::{
            DeliveryOutcome, DispatchHandlerConfig, MessageDispatchHandler,
        },
        services::{delivery::DeliveryClient, result_cache::ResultCache},
    },
    domain::{errors::DeliveryError, repositories::MessageRepository},
    infrastructure::cache::in_memory::InMemoryResultCache,
};

use common::{
    BrokenCache, HangingCache, StubClient, assert_delivery_invariant, cached_result, store_with,
};

fn handler(
    repo: Arc<dyn MessageRepository>,
    client: Arc<StubClient>,
    cache: Arc<dyn ResultCache>,
) -> MessageDispatchHandler {
    MessageDispatchHandler::new(repo, client, cache, DispatchHandlerConfig::default())
}

#[tokio::test]
async fn successful_send_marks_message_and_populates_cache() {
    let (repo, messages) = store_with(&["Insider - Project"]).await;
    let client = StubClient::answering("abc");
    let cache = Arc::new(InMemoryResultCache::new());
    let worker = handler(repo.clone(), client.clone(), cache.clone());

    let outcome = worker.deliver(&messages[0]).await.unwrap();
    assert_eq!(
        outcome,
        DeliveryOutcome::Sent {
            external_id: "abc".into()
        }
    );

    let stored = repo.get(messages[0].id).await.unwrap().unwrap();
    assert_eq!(stored.external_id(), Some("abc"));
    assert_delivery_invariant(&repo, &[stored.id]).await;

    let cached = cached_result(&*cache, stored.id).await.unwrap();
    assert_eq!(cached.message_id, "abc");
    assert_eq!(cached.record_id, "abc");
    assert_eq!(client.recipients(), vec![stored.phone_number.clone()]);
}

#[tokio::test]
async fn second_run_on_sent_message_skips_external_call() {
    let (repo, messages) = store_with(&["hello"]).await;
    let client = StubClient::answering("abc");
    let worker = handler(repo.clone(), client.clone(), Arc::new(InMemoryResultCache::new()));

    worker.deliver(&messages[0]).await.unwrap();
    let after_first = repo.get(messages[0].id).await.unwrap().unwrap();

    // replay with the stale, unsent snapshot the queue would hold
    let outcome = worker.deliver(&messages[0]).await.unwrap();
    assert_eq!(
        outcome,
        DeliveryOutcome::AlreadySent {
            external_id: "abc".into()
        }
    );
    assert_eq!(client.call_count(), 1);
    assert_eq!(repo.get(messages[0].id).await.unwrap().unwrap(), after_first);
}

#[tokio::test]
async fn content_at_limit_is_sent() {
    let exactly = "a".repeat(1000);
    let (repo, messages) = store_with(&[exactly.as_str()]).await;
    let client = StubClient::answering("abc");
    let worker = handler(repo.clone(), client.clone(), Arc::new(InMemoryResultCache::new()));

    assert!(worker.deliver(&messages[0]).await.is_ok());
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn content_over_limit_fails_without_external_call() {
    let too_long = "a".repeat(1001);
    let (repo, messages) = store_with(&[too_long.as_str()]).await;
    let client = StubClient::answering("abc");
    let worker = handler(repo.clone(), client.clone(), Arc::new(InMemoryResultCache::new()));

    let err = worker.deliver(&messages[0]).await.unwrap_err();
    assert!(matches!(
        err,
        DeliveryError::ContentTooLong {
            length: 1001,
            max: 1000
        }
    ));
    assert!(!err.is_retryable());
    assert_eq!(client.call_count(), 0);
    assert!(!repo.get(messages[0].id).await.unwrap().unwrap().is_sent());
    assert_delivery_invariant(&repo, &[messages[0].id]).await;
}

#[tokio::test]
async fn multibyte_content_is_measured_in_bytes() {
    // 500 two-byte characters is 1000 bytes, one more pushes it over
    let at_limit = "ş".repeat(500);
    let over_limit = format!("{at_limit}a");
    let (repo, messages) = store_with(&[at_limit.as_str(), over_limit.as_str()]).await;
    let client = StubClient::answering("abc");
    let worker = handler(repo.clone(), client.clone(), Arc::new(InMemoryResultCache::new()));

    assert!(worker.deliver(&messages[0]).await.is_ok());
    assert!(matches!(
        worker.deliver(&messages[1]).await,
        Err(DeliveryError::ContentTooLong { length: 1001, .. })
    ));
}

#[tokio::test]
async fn endpoint_failure_is_retryable_and_leaves_message_unsent() {
    let (repo, messages) = store_with(&["hello"]).await;
    let client = StubClient::failing("webhook returned 500 Internal Server Error");
    let worker = handler(repo.clone(), client.clone(), Arc::new(InMemoryResultCache::new()));

    let err = worker.deliver(&messages[0]).await.unwrap_err();
    assert!(matches!(err, DeliveryError::DeliveryFailed(_)));
    assert!(err.is_retryable());
    assert!(!repo.get(messages[0].id).await.unwrap().unwrap().is_sent());
    assert!(repo.list_sent().await.unwrap().is_empty());
}

#[tokio::test]
async fn cache_failure_does_not_fail_delivery() {
    let (repo, messages) = store_with(&["hello"]).await;
    let client = StubClient::answering("abc");
    let worker = handler(repo.clone(), client, Arc::new(BrokenCache));

    let outcome = worker.deliver(&messages[0]).await.unwrap();
    assert!(matches!(outcome, DeliveryOutcome::Sent { .. }));
    assert!(repo.get(messages[0].id).await.unwrap().unwrap().is_sent());
}

#[tokio::test]
async fn vanished_message_is_a_permanent_failure() {
    let (repo, messages) = store_with(&["hello"]).await;
    let client = StubClient::answering("abc");
    let worker = handler(repo, client.clone(), Arc::new(InMemoryResultCache::new()));

    let mut ghost = messages[0].clone();
    ghost.id = 999;
    let err = worker.deliver(&ghost).await.unwrap_err();
    assert!(matches!(err, DeliveryError::NotFound(999)));
    assert!(!err.is_retryable());
    assert_eq!(client.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn stalled_cache_write_does_not_hold_back_success() {
    let (repo, messages) = store_with(&["hello"]).await;
    let client = StubClient::answering("abc");
    let worker = handler(repo.clone(), client, Arc::new(HangingCache));

    let outcome = tokio::time::timeout(Duration::from_secs(3600), worker.deliver(&messages[0]))
        .await
        .expect("delivery must report success without waiting on the cache");
    assert!(matches!(outcome, Ok(DeliveryOutcome::Sent { .. })));
    assert!(repo.get(messages[0].id).await.unwrap().unwrap().is_sent());
}

struct UnreachableEndpoint;

#[async_trait]
impl DeliveryClient for UnreachableEndpoint {
    async fn send(&self, _: &str, _: &str) -> anyhow::Result<String> {
        Err(anyhow::anyhow!("connection refused")).context("error sending request")
    }
}

#[tokio::test]
async fn delivery_failure_keeps_the_whole_error_chain() {
    let (repo, messages) = store_with(&["hello"]).await;
    let worker = MessageDispatchHandler::new(
        repo,
        Arc::new(UnreachableEndpoint),
        Arc::new(InMemoryResultCache::new()),
        DispatchHandlerConfig::default(),
    );

    let err = worker.deliver(&messages[0]).await.unwrap_err();
    assert!(
        matches!(
            &err,
            DeliveryError::DeliveryFailed(reason)
                if reason == "error sending request: connection refused"
        ),
        "{err:?}"
    );
}
