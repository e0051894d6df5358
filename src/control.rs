//! Local HTTP control API.
//!
//! Stands in for the browser panel: list/add/edit/remove commands, start
//! and stop the bot, read account details and the activity log. Bind it to
//! loopback; it has no authentication of its own.

use std::future::Future;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::activity::ActivityEntry;
use crate::commands::{Command, RegistryError};
use crate::session::{BotSession, SessionError};

// ── Request / response types ───────────────────────────────────────────────────

#[derive(Serialize)]
struct AccountView {
    id: String,
    username: String,
    discriminator: String,
    verified: bool,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Debug, PartialEq)]
struct CommandView {
    index: usize,
    trigger: String,
    name: String,
    prefix: String,
    description: Option<String>,
    custom: bool,
}

impl CommandView {
    fn new(index: usize, cmd: &Command) -> Self {
        Self {
            index,
            trigger: cmd.trigger(),
            name: cmd.name.clone(),
            prefix: cmd.prefix.clone(),
            description: cmd.description.clone(),
            custom: cmd.is_custom(),
        }
    }
}

#[derive(Deserialize)]
struct CommandRequest {
    name: String,
    prefix: String,
    #[serde(default)]
    description: Option<String>,
    body: String,
}

impl CommandRequest {
    fn into_command(self) -> Command {
        Command::custom(
            &self.name,
            &self.prefix,
            self.description.as_deref(),
            &self.body,
        )
    }
}

#[derive(Serialize, Debug, PartialEq)]
struct BotStatus {
    running: bool,
    interval_ms: u64,
}

#[derive(Serialize, Debug)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, message: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
}

fn registry_error(e: RegistryError) -> ApiError {
    let status = match e {
        RegistryError::Duplicate { .. } => StatusCode::CONFLICT,
        RegistryError::InvalidField { .. } | RegistryError::InvalidScript { .. } => {
            StatusCode::BAD_REQUEST
        }
        RegistryError::NotFound { .. } => StatusCode::NOT_FOUND,
        RegistryError::Builtin { .. } => StatusCode::FORBIDDEN,
    };
    api_error(status, e)
}

fn session_error(e: SessionError) -> ApiError {
    let status = match e {
        SessionError::AlreadyRunning | SessionError::NotRunning => StatusCode::CONFLICT,
        SessionError::Scheduler(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e)
}

// ── Handlers ───────────────────────────────────────────────────────────────────

async fn account(State(session): State<BotSession>) -> Json<AccountView> {
    let account = session.account();
    Json(AccountView {
        id: account.id.clone(),
        username: account.username.clone(),
        discriminator: account.discriminator.clone(),
        verified: account.verified,
        created_at: account.created_at(),
    })
}

async fn list_commands(State(session): State<BotSession>) -> Json<Vec<CommandView>> {
    let commands = session.commands().await;
    Json(
        commands
            .iter()
            .enumerate()
            .map(|(i, c)| CommandView::new(i, c))
            .collect(),
    )
}

async fn create_command(
    State(session): State<BotSession>,
    Json(body): Json<CommandRequest>,
) -> Result<(StatusCode, Json<CommandView>), ApiError> {
    let command = body.into_command();
    let view = CommandView::new(0, &command);
    let index = session
        .add_command(command)
        .await
        .map_err(registry_error)?;
    session
        .log()
        .info(format!("Command added: {}", view.trigger));
    Ok((StatusCode::CREATED, Json(CommandView { index, ..view })))
}

async fn update_command(
    State(session): State<BotSession>,
    Path(index): Path<usize>,
    Json(body): Json<CommandRequest>,
) -> Result<Json<CommandView>, ApiError> {
    let command = body.into_command();
    let view = CommandView::new(index, &command);
    session
        .replace_command(index, command)
        .await
        .map_err(registry_error)?;
    session
        .log()
        .info(format!("Command updated: {}", view.trigger));
    Ok(Json(view))
}

async fn delete_command(
    State(session): State<BotSession>,
    Path(index): Path<usize>,
) -> Result<StatusCode, ApiError> {
    let removed = session
        .remove_command(index)
        .await
        .map_err(registry_error)?;
    session
        .log()
        .info(format!("Command deleted: {}", removed.trigger()));
    Ok(StatusCode::NO_CONTENT)
}

async fn status(session: &BotSession) -> BotStatus {
    BotStatus {
        running: session.is_running().await,
        interval_ms: session.interval_ms(),
    }
}

async fn bot_status(State(session): State<BotSession>) -> Json<BotStatus> {
    Json(status(&session).await)
}

async fn start_bot(State(session): State<BotSession>) -> Result<Json<BotStatus>, ApiError> {
    session.start().await.map_err(session_error)?;
    Ok(Json(status(&session).await))
}

async fn stop_bot(State(session): State<BotSession>) -> Result<Json<BotStatus>, ApiError> {
    session.stop().await.map_err(session_error)?;
    Ok(Json(status(&session).await))
}

async fn logs(State(session): State<BotSession>) -> Json<Vec<ActivityEntry>> {
    Json(session.log().entries())
}

pub fn router(session: BotSession) -> Router {
    Router::new()
        .route("/api/account", get(account))
        .route("/api/commands", get(list_commands).post(create_command))
        .route(
            "/api/commands/{index}",
            put(update_command).delete(delete_command),
        )
        .route("/api/bot", get(bot_status))
        .route("/api/bot/start", post(start_bot))
        .route("/api/bot/stop", post(stop_bot))
        .route("/api/logs", get(logs))
        .with_state(session)
}

/// Serve the control API until `shutdown` resolves
pub async fn serve<F>(listen: SocketAddr, session: BotSession, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind control API on {}", listen))?;
    info!("Control API listening on http://{}", listen);

    axum::serve(listener, router(session))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Control API server failed")?;
    Ok(())
}
