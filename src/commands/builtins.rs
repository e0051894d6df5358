use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::{Command, CommandRegistry, RegistryError};
use crate::config::BuiltinsConfig;
use crate::executor::{CommandContext, CommandHandler};

struct Ping;

#[async_trait]
impl CommandHandler for Ping {
    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<()> {
        ctx.bot
            .send_message(&ctx.message.channel_id, "Pong! 🏓")
            .await?;
        Ok(())
    }
}

struct Help;

#[async_trait]
impl CommandHandler for Help {
    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<()> {
        let list = ctx
            .commands
            .iter()
            .map(|c| format!("{} - {}", c.trigger(), c.description_or_default()))
            .collect::<Vec<_>>()
            .join("\n");
        ctx.bot
            .send_message(
                &ctx.message.channel_id,
                &format!("Available Commands:\n{}", list),
            )
            .await?;
        Ok(())
    }
}

struct UserInfo;

#[async_trait]
impl CommandHandler for UserInfo {
    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<()> {
        let author = &ctx.message.author;
        let info = format!(
            "Username: {}\nID: {}\nDiscriminator: {}",
            author.username, author.id, author.discriminator
        );
        ctx.bot.send_message(&ctx.message.channel_id, &info).await?;
        Ok(())
    }
}

struct Echo {
    empty_reply: String,
}

#[async_trait]
impl CommandHandler for Echo {
    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<()> {
        let reply = if ctx.args.is_empty() {
            self.empty_reply.clone()
        } else {
            ctx.args.join(" ")
        };
        ctx.bot.send_message(&ctx.message.channel_id, &reply).await?;
        Ok(())
    }
}

/// The compiled-in commands, in registration order
pub fn builtin_commands(config: &BuiltinsConfig) -> Vec<Command> {
    let prefix = config.prefix.as_str();
    vec![
        Command::builtin(
            "ping",
            prefix,
            "Check if the bot is responsive",
            Arc::new(Ping),
        ),
        Command::builtin(
            "help",
            prefix,
            "List all available commands",
            Arc::new(Help),
        ),
        Command::builtin(
            "userinfo",
            prefix,
            "Display information about yourself",
            Arc::new(UserInfo),
        ),
        Command::builtin(
            "echo",
            prefix,
            "Repeat the given text",
            Arc::new(Echo {
                empty_reply: config.echo_empty_reply.clone(),
            }),
        ),
    ]
}

impl CommandRegistry {
    /// Registry holding every built-in. Built-in names are fixed and
    /// distinct, so only a malformed prefix can fail here.
    pub fn with_builtins(config: &BuiltinsConfig) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for command in builtin_commands(config) {
            registry.add(command)?;
        }
        Ok(registry)
    }
}
