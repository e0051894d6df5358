use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Account, ChannelRef, Gateway, GatewayError, IncomingMessage, MessageEcho};
use crate::config::GatewayConfig;

#[derive(Debug, Serialize)]
struct ContentBody<'a> {
    content: &'a str,
}

/// Error payload the API attaches to non-2xx responses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    retry_after: Option<f64>,
}

/// Gateway client over the platform's REST API
pub struct RestGateway {
    client: reqwest::Client,
    base_url: String,
    authorization: String,
}

impl RestGateway {
    pub fn new(config: &GatewayConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let authorization = if config.authorization_scheme.is_empty() {
            config.token.clone()
        } else {
            format!("{} {}", config.authorization_scheme, config.token)
        };

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            authorization,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);
        self.client
            .request(method, url)
            .header("Authorization", &self.authorization)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, GatewayError> {
        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_status(status, &body))
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, GatewayError> {
        self.send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Network(format!("failed to decode response: {}", e)))
    }
}

/// Convert a non-success status plus its body into a typed error
fn map_status(status: StatusCode, body: &str) -> GatewayError {
    let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();
    let retry_after = parsed.as_ref().and_then(|b| b.retry_after);
    let message = parsed
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("no message").to_string()
            } else {
                body.trim().to_string()
            }
        });

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Unauthorized { message },
        StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimited {
            retry_after,
            message,
        },
        s if s.is_client_error() => GatewayError::Rejected {
            status: s.as_u16(),
            message,
        },
        s => GatewayError::ServerError {
            status: s.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl Gateway for RestGateway {
    async fn current_account(&self) -> Result<Account, GatewayError> {
        self.json(self.request(Method::GET, "/users/@me")).await
    }

    async fn list_direct_channels(&self) -> Result<Vec<ChannelRef>, GatewayError> {
        self.json(self.request(Method::GET, "/users/@me/channels"))
            .await
    }

    async fn list_recent_messages(
        &self,
        channel_id: &str,
        limit: u8,
    ) -> Result<Vec<IncomingMessage>, GatewayError> {
        let path = format!("/channels/{}/messages", channel_id);
        self.json(
            self.request(Method::GET, &path)
                .query(&[("limit", limit.to_string())]),
        )
        .await
    }

    async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
    ) -> Result<MessageEcho, GatewayError> {
        let path = format!("/channels/{}/messages", channel_id);
        self.json(
            self.request(Method::POST, &path)
                .json(&ContentBody { content }),
        )
        .await
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<MessageEcho, GatewayError> {
        let path = format!("/channels/{}/messages/{}", channel_id, message_id);
        self.json(
            self.request(Method::PATCH, &path)
                .json(&ContentBody { content }),
        )
        .await
    }

    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), GatewayError> {
        let path = format!("/channels/{}/messages/{}", channel_id, message_id);
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }
}
