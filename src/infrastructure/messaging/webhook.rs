use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::application::services::delivery::DeliveryClient;

pub const AUTH_HEADER: &str = "x-ins-auth-key";

#[derive(Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub auth_key: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("url", &self.url)
            .field("auth_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

pub struct WebhookClient {
    http: Client,
    url: String,
    auth_key: String,
}

impl WebhookClient {
    pub fn new(config: WebhookConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent("messaging-service/webhook")
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            url: config.url,
            auth_key: config.auth_key,
        })
    }
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(rename = "messageId")]
    message_id: Option<String>,
}

#[async_trait]
impl DeliveryClient for WebhookClient {
    async fn send(&self, to: &str, content: &str) -> anyhow::Result<String> {
        let response = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(AUTH_HEADER, &self.auth_key)
            .json(&SendRequest { to, content })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("webhook returned {status}: {body}");
        }

        let body = response.text().await?;
        let payload: SendResponse = serde_json::from_str(&body)
            .map_err(|err| anyhow::anyhow!("invalid webhook response ({err}): {body}"))?;

        match payload.message_id {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => anyhow::bail!("webhook response has no messageId: {body}"),
        }
    }
}
