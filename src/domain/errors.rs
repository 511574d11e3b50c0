use thiserror::Error;

use crate::domain::models::MessageId;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("content is {length} bytes, limit is {max}")]
    ContentTooLong { length: usize, max: usize },
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
    #[error("message store unavailable: {0}")]
    StoreUnavailable(#[source] anyhow::Error),
    #[error("message {0} not found")]
    NotFound(MessageId),
}

impl DeliveryError {
    /// Whether the dispatch queue should schedule another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeliveryError::DeliveryFailed(_) | DeliveryError::StoreUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(DeliveryError::DeliveryFailed("HTTP 500".into()).is_retryable());
        assert!(DeliveryError::StoreUnavailable(anyhow::anyhow!("down")).is_retryable());
        assert!(
            !DeliveryError::ContentTooLong {
                length: 1001,
                max: 1000
            }
            .is_retryable()
        );
        assert!(!DeliveryError::NotFound(3).is_retryable());
    }
}
