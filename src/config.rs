use std::env::var;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;
use thiserror::Error;

use crate::{
    application::{
        handlers::message_dispatcher::{DEFAULT_MAX_CONTENT_LENGTH, DispatchHandlerConfig},
        services::rate_limiter::{MAX_WINDOW, RateLimitConfig},
        usecases::process_messages::ProcessMessagesConfig,
    },
    infrastructure::messaging::{dispatch_queue::DispatchQueueConfig, webhook::WebhookConfig},
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env param {0}")]
    Missing(&'static str),
    #[error("env param {key} is invalid: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub scheme: String,
    pub host: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub redis_url: Option<String>,
    pub webhook: WebhookConfig,
    pub rate_limit: RateLimitConfig,
    pub max_content_length: usize,
    pub selection_batch_size: u32,
    pub trigger_interval: Duration,
    pub queue_workers: usize,
    pub queue_max_attempts: u32,
    pub retry_backoff: Duration,
    pub retry_backoff_max: Duration,
    pub result_cache_ttl: Duration,
}

impl Config {
    pub fn try_parse() -> Result<Config, ConfigError> {
        let _ = dotenv();
        Self::from_lookup(|key| var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        Ok(Config {
            port: env.parsed("PORT", 8080)?,
            scheme: env.optional("SCHEME").unwrap_or_else(|| "http".to_string()),
            host: env.optional("HOST").unwrap_or_else(|| "localhost".to_string()),
            database_url: env.optional("DATABASE_URL"),
            database_max_connections: env.parsed("DATABASE_MAX_CONNECTIONS", 5)?,
            redis_url: env.optional("REDIS_URL"),
            webhook: WebhookConfig {
                url: env.required("WEBHOOK_URL")?,
                auth_key: env.required("WEBHOOK_AUTH_KEY")?,
                timeout: Duration::from_secs(env.positive("WEBHOOK_TIMEOUT_SECONDS", 15)?),
            },
            rate_limit: RateLimitConfig {
                max_admissions: env.positive("RATE_LIMIT_COUNT", 2)?,
                window: Duration::from_secs(env.bounded(
                    "RATE_LIMIT_WINDOW_SECONDS",
                    5,
                    MAX_WINDOW.as_secs(),
                )?),
            },
            max_content_length: env.positive("MAX_CONTENT_LENGTH", DEFAULT_MAX_CONTENT_LENGTH)?,
            selection_batch_size: env.positive("SELECTION_BATCH_SIZE", 2)?,
            trigger_interval: Duration::from_secs(env.positive("TRIGGER_INTERVAL_SECONDS", 5)?),
            queue_workers: env.positive("QUEUE_WORKERS", 2)?,
            queue_max_attempts: env.positive("QUEUE_MAX_ATTEMPTS", 3)?,
            retry_backoff: Duration::from_millis(env.parsed("QUEUE_RETRY_BACKOFF_MS", 1_000)?),
            retry_backoff_max: Duration::from_millis(
                env.parsed("QUEUE_RETRY_BACKOFF_MAX_MS", 30_000)?,
            ),
            result_cache_ttl: Duration::from_secs(
                env.positive("RESULT_CACHE_TTL_SECONDS", 7 * 24 * 60 * 60)?,
            ),
        })
    }

    pub fn server_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    pub fn dispatch_handler(&self) -> DispatchHandlerConfig {
        DispatchHandlerConfig {
            max_content_length: self.max_content_length,
            result_ttl: self.result_cache_ttl,
            ..DispatchHandlerConfig::default()
        }
    }

    pub fn dispatch_queue(&self) -> DispatchQueueConfig {
        DispatchQueueConfig {
            workers: self.queue_workers,
            retry_backoff: self.retry_backoff,
            retry_backoff_max: self.retry_backoff_max,
        }
    }

    pub fn process_messages(&self) -> ProcessMessagesConfig {
        ProcessMessagesConfig {
            batch_size: self.selection_batch_size,
            max_attempts: self.queue_max_attempts,
        }
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &'static str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn parsed<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(key) {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse::<T>()
                .map_err(|_| ConfigError::Invalid { key, value }),
        }
    }

    fn positive<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + Default + ToString,
    {
        let value = self.parsed(key, default)?;
        if value <= T::default() {
            return Err(ConfigError::Invalid {
                key,
                value: value.to_string(),
            });
        }
        Ok(value)
    }

    fn bounded<T>(&self, key: &'static str, default: T, max: T) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + Default + ToString,
    {
        let value = self.positive(key, default)?;
        if value > max {
            return Err(ConfigError::Invalid {
                key,
                value: value.to_string(),
            });
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn parse(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("WEBHOOK_URL", "https://webhook.site/test"),
        ("WEBHOOK_AUTH_KEY", "secret"),
    ];

    #[test]
    fn defaults_match_the_delivery_contract() {
        let config = parse(&REQUIRED).unwrap();
        assert_eq!(config.rate_limit.max_admissions, 2);
        assert_eq!(config.rate_limit.window, Duration::from_secs(5));
        assert_eq!(config.max_content_length, 1000);
        assert_eq!(config.selection_batch_size, 2);
        assert_eq!(config.result_cache_ttl, Duration::from_secs(604_800));
        assert_eq!(config.webhook.timeout, Duration::from_secs(15));
        assert!(config.database_url.is_none());
        assert_eq!(config.server_url(), "http://localhost:8080");
    }

    #[test]
    fn auth_key_has_no_fallback() {
        let err = parse(&[("WEBHOOK_URL", "https://webhook.site/test")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("WEBHOOK_AUTH_KEY")));

        let err = parse(&[
            ("WEBHOOK_URL", "https://webhook.site/test"),
            ("WEBHOOK_AUTH_KEY", "  "),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("WEBHOOK_AUTH_KEY")));
    }

    #[test]
    fn rate_limit_is_configurable() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RATE_LIMIT_COUNT", "10"));
        pairs.push(("RATE_LIMIT_WINDOW_SECONDS", "60"));
        let config = parse(&pairs).unwrap();
        assert_eq!(config.rate_limit.max_admissions, 10);
        assert_eq!(config.rate_limit.window, Duration::from_secs(60));
    }

    #[test]
    fn zero_or_garbage_values_are_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RATE_LIMIT_COUNT", "0"));
        assert!(matches!(
            parse(&pairs).unwrap_err(),
            ConfigError::Invalid {
                key: "RATE_LIMIT_COUNT",
                ..
            }
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RATE_LIMIT_WINDOW_SECONDS", "18446744073709551615"));
        assert!(matches!(
            parse(&pairs).unwrap_err(),
            ConfigError::Invalid {
                key: "RATE_LIMIT_WINDOW_SECONDS",
                ..
            }
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "eighty"));
        assert!(matches!(
            parse(&pairs).unwrap_err(),
            ConfigError::Invalid { key: "PORT", .. }
        ));
    }
}
