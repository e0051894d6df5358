pub mod rest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Milliseconds between the Unix epoch and the platform's snowflake epoch (2015-01-01).
const SNOWFLAKE_EPOCH_MS: i64 = 1_420_070_400_000;

/// The authenticated account behind the credential
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    #[serde(default = "default_discriminator")]
    pub discriminator: String,
    #[serde(default)]
    pub verified: bool,
}

impl Account {
    /// Creation time encoded in the upper bits of the account's snowflake id
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let raw: u64 = self.id.parse().ok()?;
        let ms = i64::try_from(raw >> 22).ok()? + SNOWFLAKE_EPOCH_MS;
        DateTime::from_timestamp_millis(ms)
    }
}

/// A direct-message channel the account participates in
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChannelRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Author {
    pub id: String,
    pub username: String,
    #[serde(default = "default_discriminator")]
    pub discriminator: String,
}

/// A message fetched from a channel. Immutable once fetched.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct IncomingMessage {
    pub id: String,
    pub channel_id: String,
    pub author: Author,
    #[serde(default)]
    pub content: String,
}

/// What the gateway returns after a create or edit
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageEcho {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub content: String,
}

fn default_discriminator() -> String {
    "0".to_string()
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum GatewayError {
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("rate limited (retry after {retry_after:?}s): {message}")]
    RateLimited {
        retry_after: Option<f64>,
        message: String,
    },

    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),
}

/// Authenticated calls against the messaging REST API.
///
/// Implementations hold no session state and never retry; the poll loop
/// decides what a failure means.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn current_account(&self) -> Result<Account, GatewayError>;

    async fn list_direct_channels(&self) -> Result<Vec<ChannelRef>, GatewayError>;

    /// Most recent messages of a channel, newest first.
    async fn list_recent_messages(
        &self,
        channel_id: &str,
        limit: u8,
    ) -> Result<Vec<IncomingMessage>, GatewayError>;

    async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
    ) -> Result<MessageEcho, GatewayError>;

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<MessageEcho, GatewayError>;

    async fn delete_message(&self, channel_id: &str, message_id: &str)
        -> Result<(), GatewayError>;
}
