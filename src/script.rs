//! Embedded script engine for custom command bodies.
//!
//! A body runs as a Rhai script with four variables in scope: `bot`,
//! `message`, `args` and `commands`. Module imports and `eval` are disabled
//! and every run is bounded by an operation budget. Scripts are synchronous,
//! so each run happens on the blocking pool and `bot` calls block on the
//! runtime until the gateway answers.

use rhai::module_resolvers::DummyModuleResolver;
use rhai::{Array, Dynamic, Engine, EvalAltResult, Map, Scope};
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::commands::Command;
use crate::config::ScriptConfig;
use crate::executor::BotApi;
use crate::gateway::{IncomingMessage, MessageEcho};

/// The `bot` variable seen by scripts
#[derive(Clone)]
struct ScriptBot {
    api: BotApi,
    handle: Handle,
}

impl ScriptBot {
    fn send_message(
        &mut self,
        channel_id: Dynamic,
        content: Dynamic,
    ) -> Result<Map, Box<EvalAltResult>> {
        let channel_id = channel_id.to_string();
        let content = content.to_string();
        self.handle
            .block_on(self.api.send_message(&channel_id, &content))
            .map(echo_to_map)
            .map_err(|e| format!("Failed to send message: {}", e).into())
    }

    fn edit_message(
        &mut self,
        channel_id: Dynamic,
        message_id: Dynamic,
        content: Dynamic,
    ) -> Result<Map, Box<EvalAltResult>> {
        let channel_id = channel_id.to_string();
        let message_id = message_id.to_string();
        let content = content.to_string();
        self.handle
            .block_on(self.api.edit_message(&channel_id, &message_id, &content))
            .map(echo_to_map)
            .map_err(|e| format!("Failed to edit message: {}", e).into())
    }

    fn delete_message(
        &mut self,
        channel_id: Dynamic,
        message_id: Dynamic,
    ) -> Result<(), Box<EvalAltResult>> {
        let channel_id = channel_id.to_string();
        let message_id = message_id.to_string();
        self.handle
            .block_on(self.api.delete_message(&channel_id, &message_id))
            .map_err(|e| format!("Failed to delete message: {}", e).into())
    }
}

fn echo_to_map(echo: MessageEcho) -> Map {
    let mut map = Map::new();
    map.insert("id".into(), echo.id.into());
    map.insert("channel_id".into(), echo.channel_id.into());
    map.insert("content".into(), echo.content.into());
    map
}

fn message_to_map(message: &IncomingMessage) -> Map {
    let mut author = Map::new();
    author.insert("id".into(), message.author.id.clone().into());
    author.insert("username".into(), message.author.username.clone().into());
    author.insert(
        "discriminator".into(),
        message.author.discriminator.clone().into(),
    );

    let mut map = Map::new();
    map.insert("id".into(), message.id.clone().into());
    map.insert("channel_id".into(), message.channel_id.clone().into());
    map.insert("content".into(), message.content.clone().into());
    map.insert("author".into(), Dynamic::from_map(author));
    map
}

fn commands_to_array(commands: &[Command]) -> Array {
    commands
        .iter()
        .map(|cmd| {
            let mut map = Map::new();
            map.insert("name".into(), cmd.name.clone().into());
            map.insert("prefix".into(), cmd.prefix.clone().into());
            map.insert("trigger".into(), cmd.trigger().into());
            map.insert(
                "description".into(),
                cmd.description_or_default().to_string().into(),
            );
            map.insert("custom".into(), cmd.is_custom().into());
            Dynamic::from_map(map)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ScriptRunner {
    max_operations: u64,
    max_call_depth: usize,
}

impl ScriptRunner {
    pub fn new(config: &ScriptConfig) -> Self {
        Self {
            max_operations: config.max_operations,
            max_call_depth: config.max_call_depth,
        }
    }

    fn engine(&self) -> Engine {
        let mut engine = Engine::new();
        engine.set_max_operations(self.max_operations);
        engine.set_max_call_levels(self.max_call_depth);
        engine.set_module_resolver(DummyModuleResolver::new());
        engine.disable_symbol("eval");
        engine.on_print(|text| info!("[script] {}", text));
        engine.on_debug(|text, _source, pos| debug!("[script] {} ({})", text, pos));

        engine
            .register_type_with_name::<ScriptBot>("Bot")
            .register_fn("send_message", ScriptBot::send_message)
            .register_fn("edit_message", ScriptBot::edit_message)
            .register_fn("delete_message", ScriptBot::delete_message);
        engine
    }

    /// Parse `source` without running it
    pub fn check(&self, source: &str) -> Result<(), String> {
        self.engine()
            .compile(source)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    /// Run a command body to completion; the error is the script's failure text
    pub async fn run(
        &self,
        source: &str,
        api: BotApi,
        message: &IncomingMessage,
        args: &[String],
        commands: &[Command],
    ) -> Result<(), String> {
        let bot = ScriptBot {
            api,
            handle: Handle::current(),
        };
        let message = message_to_map(message);
        let args: Array = args.iter().cloned().map(Dynamic::from).collect();
        let commands = commands_to_array(commands);
        let source = source.to_string();
        let runner = self.clone();

        tokio::task::spawn_blocking(move || {
            let engine = runner.engine();
            let mut scope = Scope::new();
            scope.push("bot", bot);
            scope.push("message", message);
            scope.push("args", args);
            scope.push("commands", commands);
            engine
                .run_with_scope(&mut scope, &source)
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| format!("script task failed: {}", e))?
    }
}
