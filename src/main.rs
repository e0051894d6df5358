mod activity;
mod commands;
mod config;
mod control;
mod dedup;
mod dispatcher;
mod executor;
mod gateway;
mod scheduler;
mod script;
mod session;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::activity::ActivityLog;
use crate::commands::{Command, CommandRegistry};
use crate::config::Config;
use crate::gateway::rest::RestGateway;
use crate::gateway::Gateway;
use crate::scheduler::Scheduler;
use crate::script::ScriptRunner;
use crate::session::BotSession;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pollbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  API: {}", config.gateway.base_url);
    info!("  Poll interval: {}ms", config.poller.interval_ms);
    info!("  Custom commands: {}", config.commands.len());

    // Resolve the account behind the token
    let gateway: Arc<dyn Gateway> = Arc::new(RestGateway::new(&config.gateway)?);
    let account = gateway
        .current_account()
        .await
        .context("Invalid token: failed to fetch the authenticated account")?;
    match account.created_at() {
        Some(created) => info!(
            "Authenticated as {} ({}), account created {}",
            account.username,
            account.id,
            created.format("%Y-%m-%d")
        ),
        None => info!("Authenticated as {} ({})", account.username, account.id),
    }

    // Built-ins first, then custom commands from config
    let scripts = ScriptRunner::new(&config.script);
    let mut registry = CommandRegistry::with_builtins(&config.builtins)
        .context("Failed to register built-in commands")?;
    for custom in &config.commands {
        let command = Command::custom(
            &custom.name,
            &custom.prefix,
            custom.description.as_deref(),
            &custom.body,
        );
        if let Err(reason) = scripts.check(&custom.body) {
            warn!("Skipping command {}: script does not compile: {}", command.trigger(), reason);
            continue;
        }
        if let Err(e) = registry.add(command) {
            warn!("Skipping command from config: {}", e);
        }
    }

    let scheduler = Scheduler::new();

    let log = ActivityLog::new(config.log.capacity);
    let session = BotSession::new(
        gateway,
        account,
        registry,
        scripts,
        scheduler.clone(),
        log,
        config.poller.clone(),
    );

    if config.poller.autostart {
        session.start().await?;
    }

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let control = if config.control.enabled {
        let listen = config.control.listen;
        let session = session.clone();
        Some(tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = control::serve(listen, session, shutdown).await {
                error!("{:#}", e);
            }
        }))
    } else {
        None
    };

    info!("Bot is ready, press Ctrl-C to exit");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Shutting down...");
    if session.is_running().await {
        session.stop().await?;
    }
    let _ = shutdown_tx.send(());
    if let Some(handle) = control {
        let _ = handle.await;
    }
    scheduler.shutdown().await;

    Ok(())
}
