use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub gateway: GatewayConfig,
    #[serde(default = "default_poller_config")]
    pub poller: PollerConfig,
    #[serde(default = "default_builtins_config")]
    pub builtins: BuiltinsConfig,
    #[serde(default = "default_script_config")]
    pub script: ScriptConfig,
    #[serde(default = "default_control_config")]
    pub control: ControlConfig,
    #[serde(default = "default_log_config")]
    pub log: LogConfig,
    #[serde(default)]
    pub commands: Vec<CustomCommandConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub token: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Optional scheme placed before the token, e.g. "Bot". Empty sends the bare token.
    #[serde(default)]
    pub authorization_scheme: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollerConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_message_limit")]
    pub message_limit: u8,
    #[serde(default = "default_true")]
    pub autostart: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BuiltinsConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Reply for `echo` when no text follows the trigger
    #[serde(default = "default_echo_empty_reply")]
    pub echo_empty_reply: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScriptConfig {
    #[serde(default = "default_max_operations")]
    pub max_operations: u64,
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ControlConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_capacity")]
    pub capacity: usize,
}

/// A custom command declared in the config file
#[derive(Debug, Deserialize, Clone)]
pub struct CustomCommandConfig {
    pub name: String,
    pub prefix: String,
    #[serde(default)]
    pub description: Option<String>,
    pub body: String,
}

fn default_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_interval_ms() -> u64 {
    1500
}

fn default_message_limit() -> u8 {
    5
}

fn default_true() -> bool {
    true
}

fn default_prefix() -> String {
    "!".to_string()
}

fn default_echo_empty_reply() -> String {
    "Please provide some text to echo!".to_string()
}

fn default_max_operations() -> u64 {
    100_000
}

fn default_max_call_depth() -> usize {
    32
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8719))
}

fn default_log_capacity() -> usize {
    500
}

pub fn default_poller_config() -> PollerConfig {
    PollerConfig {
        interval_ms: default_interval_ms(),
        message_limit: default_message_limit(),
        autostart: true,
    }
}

pub fn default_builtins_config() -> BuiltinsConfig {
    BuiltinsConfig {
        prefix: default_prefix(),
        echo_empty_reply: default_echo_empty_reply(),
    }
}

pub fn default_script_config() -> ScriptConfig {
    ScriptConfig {
        max_operations: default_max_operations(),
        max_call_depth: default_max_call_depth(),
    }
}

fn default_control_config() -> ControlConfig {
    ControlConfig {
        enabled: true,
        listen: default_listen(),
    }
}

fn default_log_config() -> LogConfig {
    LogConfig {
        capacity: default_log_capacity(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.gateway.token.trim().is_empty() {
            anyhow::bail!("gateway.token must not be empty");
        }
        if self.poller.interval_ms < 100 {
            anyhow::bail!(
                "poller.interval_ms must be at least 100 (got {})",
                self.poller.interval_ms
            );
        }
        if !(1..=100).contains(&self.poller.message_limit) {
            anyhow::bail!(
                "poller.message_limit must be between 1 and 100 (got {})",
                self.poller.message_limit
            );
        }
        let prefix = &self.builtins.prefix;
        if prefix.is_empty() || prefix.contains(char::is_whitespace) {
            anyhow::bail!(
                "builtins.prefix must be non-empty and contain no whitespace (got {:?})",
                prefix
            );
        }
        Ok(())
    }
}
