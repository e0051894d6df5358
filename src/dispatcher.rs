use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::activity::ActivityLog;
use crate::commands::CommandRegistry;
use crate::executor::{CommandExecutor, ExecutionError};
use crate::gateway::IncomingMessage;

/// Registry shared between the poll loop (reads) and user actions (writes)
pub type SharedRegistry = Arc<RwLock<CommandRegistry>>;

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    NoMatch,
    Executed { trigger: String },
    Failed(ExecutionError),
}

/// Matches messages against the registry and runs whatever matched
#[derive(Clone)]
pub struct Dispatcher {
    registry: SharedRegistry,
    executor: CommandExecutor,
    log: ActivityLog,
}

impl Dispatcher {
    pub fn new(registry: SharedRegistry, executor: CommandExecutor, log: ActivityLog) -> Self {
        Self {
            registry,
            executor,
            log,
        }
    }

    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    pub async fn dispatch(&self, message: &IncomingMessage) -> DispatchOutcome {
        // Snapshot under the read lock so user edits never block on a running command.
        let (command, args, commands) = {
            let registry = self.registry.read().await;
            match registry.find(&message.content) {
                Some((command, args)) => (command, args, registry.commands().to_vec()),
                None => {
                    debug!("No command matches message {}", message.id);
                    return DispatchOutcome::NoMatch;
                }
            }
        };

        let trigger = command.trigger();
        self.log.info(format!(
            "Matched {} from {} in {}",
            trigger, message.author.username, message.channel_id
        ));

        match self
            .executor
            .execute(&command, message, &args, &commands)
            .await
        {
            Ok(()) => {
                self.log
                    .info(format!("Executed: {} in {}", trigger, message.channel_id));
                DispatchOutcome::Executed { trigger }
            }
            Err(e) => {
                self.log
                    .error(format!("Error executing {}: {}", trigger, e.message));
                DispatchOutcome::Failed(e)
            }
        }
    }
}
