use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;

use crate::commands::{Command, CommandBody};
use crate::gateway::{Gateway, GatewayError, IncomingMessage, MessageEcho};
use crate::script::ScriptRunner;

/// The message operations a command may perform. Nothing else of the
/// gateway is reachable from a command.
#[derive(Clone)]
pub struct BotApi {
    gateway: Arc<dyn Gateway>,
}

impl BotApi {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    pub async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
    ) -> Result<MessageEcho, GatewayError> {
        self.gateway.send_message(channel_id, content).await
    }

    pub async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<MessageEcho, GatewayError> {
        self.gateway
            .edit_message(channel_id, message_id, content)
            .await
    }

    pub async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), GatewayError> {
        self.gateway.delete_message(channel_id, message_id).await
    }
}

/// Everything a command sees when it runs
pub struct CommandContext<'a> {
    pub bot: &'a BotApi,
    pub message: &'a IncomingMessage,
    pub args: &'a [String],
    pub commands: &'a [Command],
}

/// A compiled-in command implementation
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<()>;
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error("{trigger} failed: {message}")]
pub struct ExecutionError {
    pub trigger: String,
    pub message: String,
}

/// Runs a matched command's body and turns every failure, panics included,
/// into an `ExecutionError`.
#[derive(Clone)]
pub struct CommandExecutor {
    bot: BotApi,
    scripts: ScriptRunner,
}

impl CommandExecutor {
    pub fn new(gateway: Arc<dyn Gateway>, scripts: ScriptRunner) -> Self {
        Self {
            bot: BotApi::new(gateway),
            scripts,
        }
    }

    pub fn scripts(&self) -> &ScriptRunner {
        &self.scripts
    }

    pub async fn execute(
        &self,
        command: &Command,
        message: &IncomingMessage,
        args: &[String],
        commands: &[Command],
    ) -> Result<(), ExecutionError> {
        let fail = |message: String| ExecutionError {
            trigger: command.trigger(),
            message,
        };

        match &command.body {
            CommandBody::Native(handler) => {
                let ctx = CommandContext {
                    bot: &self.bot,
                    message,
                    args,
                    commands,
                };
                match AssertUnwindSafe(handler.execute(&ctx)).catch_unwind().await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(fail(format!("{:#}", e))),
                    Err(_) => Err(fail("command panicked".to_string())),
                }
            }
            CommandBody::Script(source) => self
                .scripts
                .run(source, self.bot.clone(), message, args, commands)
                .await
                .map_err(fail),
        }
    }
}
