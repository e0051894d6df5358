pub mod builtins;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::executor::CommandHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Builtin,
    Custom,
}

/// What runs when a command triggers
#[derive(Clone)]
pub enum CommandBody {
    /// Compiled-in handler
    Native(Arc<dyn CommandHandler>),
    /// Script source evaluated by the embedded engine
    Script(String),
}

impl fmt::Debug for CommandBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandBody::Native(_) => f.write_str("Native(..)"),
            CommandBody::Script(src) => f.debug_tuple("Script").field(src).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    pub prefix: String,
    pub description: Option<String>,
    pub body: CommandBody,
    pub origin: Origin,
}

impl Command {
    pub fn builtin(
        name: &str,
        prefix: &str,
        description: &str,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
            description: Some(description.to_string()),
            body: CommandBody::Native(handler),
            origin: Origin::Builtin,
        }
    }

    pub fn custom(name: &str, prefix: &str, description: Option<&str>, script: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            prefix: prefix.trim().to_string(),
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            body: CommandBody::Script(script.trim().to_string()),
            origin: Origin::Custom,
        }
    }

    /// Literal text a message must start with: prefix followed by name
    pub fn trigger(&self) -> String {
        format!("{}{}", self.prefix, self.name)
    }

    pub fn description_or_default(&self) -> &str {
        self.description.as_deref().unwrap_or("No description")
    }

    pub fn is_custom(&self) -> bool {
        self.origin == Origin::Custom
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum RegistryError {
    #[error("a command with trigger '{trigger}' already exists")]
    Duplicate { trigger: String },

    #[error("invalid command field '{field}': must be non-empty and contain no whitespace")]
    InvalidField { field: &'static str },

    #[error("script for '{trigger}' does not compile: {reason}")]
    InvalidScript { trigger: String, reason: String },

    #[error("no command at index {index}")]
    NotFound { index: usize },

    #[error("built-in command '{trigger}' cannot be modified")]
    Builtin { trigger: String },
}

/// Match `content` against one trigger.
///
/// Returns the whitespace-split arguments when the trimmed content is the
/// trigger itself or the trigger followed by whitespace.
pub fn match_trigger(content: &str, trigger: &str) -> Option<Vec<String>> {
    let rest = content.trim().strip_prefix(trigger)?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.split_whitespace().map(str::to_string).collect())
}

/// Ordered command table. Registration order decides which command wins
/// when one trigger is a prefix of another.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: Vec<Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, command: Command) -> Result<(), RegistryError> {
        validate(&command)?;
        let trigger = command.trigger();
        if self.position(&command.prefix, &command.name).is_some() {
            return Err(RegistryError::Duplicate { trigger });
        }
        info!("Registered command: {}", trigger);
        self.commands.push(command);
        Ok(())
    }

    /// Remove a custom command by position
    pub fn remove(&mut self, index: usize) -> Result<Command, RegistryError> {
        let existing = self.commands.get(index).ok_or(RegistryError::NotFound { index })?;
        if !existing.is_custom() {
            return Err(RegistryError::Builtin {
                trigger: existing.trigger(),
            });
        }
        let removed = self.commands.remove(index);
        info!("Removed command: {}", removed.trigger());
        Ok(removed)
    }

    /// Swap a custom command for an edited version, keeping its position
    pub fn replace(&mut self, index: usize, command: Command) -> Result<(), RegistryError> {
        let existing = self.commands.get(index).ok_or(RegistryError::NotFound { index })?;
        if !existing.is_custom() {
            return Err(RegistryError::Builtin {
                trigger: existing.trigger(),
            });
        }
        validate(&command)?;
        if let Some(other) = self.position(&command.prefix, &command.name) {
            if other != index {
                return Err(RegistryError::Duplicate {
                    trigger: command.trigger(),
                });
            }
        }
        info!("Updated command: {}", command.trigger());
        self.commands[index] = command;
        Ok(())
    }

    /// First command, in registration order, whose trigger matches `content`
    pub fn find(&self, content: &str) -> Option<(Command, Vec<String>)> {
        self.commands.iter().find_map(|cmd| {
            match_trigger(content, &cmd.trigger()).map(|args| (cmd.clone(), args))
        })
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    fn position(&self, prefix: &str, name: &str) -> Option<usize> {
        self.commands
            .iter()
            .position(|c| c.prefix == prefix && c.name == name)
    }
}

fn validate(command: &Command) -> Result<(), RegistryError> {
    let token_ok = |s: &str| !s.is_empty() && !s.contains(char::is_whitespace);
    if !token_ok(&command.name) {
        return Err(RegistryError::InvalidField { field: "name" });
    }
    if !token_ok(&command.prefix) {
        return Err(RegistryError::InvalidField { field: "prefix" });
    }
    if let CommandBody::Script(src) = &command.body {
        if src.trim().is_empty() {
            return Err(RegistryError::InvalidField { field: "body" });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(name: &str) -> Command {
        Command::custom(name, "!", None, "let x = 1;")
    }

    fn triggers(registry: &CommandRegistry) -> Vec<String> {
        registry.commands().iter().map(Command::trigger).collect()
    }

    #[test]
    fn test_duplicate_add_is_rejected_and_leaves_registry_unchanged() {
        let mut registry = CommandRegistry::new();
        registry.add(script("ping")).unwrap();

        let err = registry
            .add(Command::custom("ping", "!", Some("again"), "let y = 2;"))
            .unwrap_err();

        assert_eq!(
            err,
            RegistryError::Duplicate {
                trigger: "!ping".to_string()
            }
        );
        assert_eq!(registry.len(), 1);
        assert!(registry.commands()[0].description.is_none());
    }

    #[test]
    fn test_same_name_with_other_prefix_is_allowed() {
        let mut registry = CommandRegistry::new();
        registry.add(script("ping")).unwrap();
        registry
            .add(Command::custom("ping", "?", None, "let x = 1;"))
            .unwrap();
        assert_eq!(triggers(&registry), vec!["!ping", "?ping"]);
    }

    #[test]
    fn test_invalid_fields_are_rejected() {
        let mut registry = CommandRegistry::new();
        assert_eq!(
            registry.add(Command::custom("", "!", None, "1")),
            Err(RegistryError::InvalidField { field: "name" })
        );
        assert_eq!(
            registry.add(Command::custom("two words", "!", None, "1")),
            Err(RegistryError::InvalidField { field: "name" })
        );
        assert_eq!(
            registry.add(Command::custom("ok", " ", None, "1")),
            Err(RegistryError::InvalidField { field: "prefix" })
        );
        assert_eq!(
            registry.add(Command::custom("ok", "!", None, "   ")),
            Err(RegistryError::InvalidField { field: "body" })
        );
        assert!(registry.commands().is_empty());
    }

    #[test]
    fn test_find_exact_trigger_has_no_args() {
        let mut registry = CommandRegistry::new();
        registry.add(script("ping")).unwrap();

        let (cmd, args) = registry.find("!ping").unwrap();
        assert_eq!(cmd.trigger(), "!ping");
        assert!(args.is_empty());
    }

    #[test]
    fn test_find_splits_rest_on_whitespace_runs() {
        let mut registry = CommandRegistry::new();
        registry.add(script("echo")).unwrap();

        let (_, args) = registry.find("  !echo   hello \t world  ").unwrap();
        assert_eq!(args, vec!["hello", "world"]);
    }

    #[test]
    fn test_find_requires_boundary_after_trigger() {
        let mut registry = CommandRegistry::new();
        registry.add(script("ping")).unwrap();

        assert!(registry.find("!pingfoo").is_none());
        assert!(registry.find("ping").is_none());
        assert!(registry.find("say !ping").is_none());
        assert!(registry.find("").is_none());
    }

    #[test]
    fn test_find_first_registered_wins() {
        let mut registry = CommandRegistry::new();
        registry
            .add(Command::custom("a", "!", Some("first"), "1"))
            .unwrap();
        registry
            .add(Command::custom("a", "!!", Some("second"), "2"))
            .unwrap();
        registry
            .add(Command::custom("!a", "!", Some("third"), "3"))
            .unwrap();

        // "!!a" matches both "!!a" (second) and "!" + "!a" (third); registration order decides.
        let (cmd, _) = registry.find("!!a x").unwrap();
        assert_eq!(cmd.description.as_deref(), Some("second"));
    }

    #[test]
    fn test_remove_custom_by_index() {
        let mut registry = CommandRegistry::new();
        registry.add(script("one")).unwrap();
        registry.add(script("two")).unwrap();

        let removed = registry.remove(0).unwrap();
        assert_eq!(removed.name, "one");
        assert_eq!(triggers(&registry), vec!["!two"]);
        assert_eq!(
            registry.remove(5).unwrap_err(),
            RegistryError::NotFound { index: 5 }
        );
    }

    #[test]
    fn test_builtins_cannot_be_removed_or_replaced() {
        let mut registry =
            CommandRegistry::with_builtins(&crate::config::default_builtins_config()).unwrap();
        let before = registry.len();

        assert!(matches!(
            registry.remove(0),
            Err(RegistryError::Builtin { .. })
        ));
        assert!(matches!(
            registry.replace(0, script("other")),
            Err(RegistryError::Builtin { .. })
        ));
        assert_eq!(registry.len(), before);
    }

    #[test]
    fn test_replace_keeps_position_and_checks_duplicates() {
        let mut registry = CommandRegistry::new();
        registry.add(script("one")).unwrap();
        registry.add(script("two")).unwrap();

        registry
            .replace(0, Command::custom("one", "!", Some("edited"), "2"))
            .unwrap();
        assert_eq!(registry.commands()[0].description.as_deref(), Some("edited"));

        assert_eq!(
            registry.replace(0, script("two")),
            Err(RegistryError::Duplicate {
                trigger: "!two".to_string()
            })
        );
        assert_eq!(triggers(&registry), vec!["!one", "!two"]);
    }

    #[test]
    fn test_match_trigger_handles_multibyte_content() {
        assert_eq!(
            match_trigger("!say 🏓 ok", "!say"),
            Some(vec!["🏓".to_string(), "ok".to_string()])
        );
        assert_eq!(match_trigger("!say🏓", "!say"), None);
    }
}
