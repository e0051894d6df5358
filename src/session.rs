use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::activity::ActivityLog;
use crate::commands::{Command, CommandBody, CommandRegistry, RegistryError};
use crate::config::PollerConfig;
use crate::dedup::DedupTracker;
use crate::dispatcher::{DispatchOutcome, Dispatcher, SharedRegistry};
use crate::executor::CommandExecutor;
use crate::gateway::{Account, Gateway};
use crate::script::ScriptRunner;
use crate::scheduler::Scheduler;

/// Epoch value meaning "no session is running"
const STOPPED: u64 = 0;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SessionError {
    #[error("bot is already running")]
    AlreadyRunning,

    #[error("bot is not running")]
    NotRunning,

    #[error("scheduler error: {0}")]
    Scheduler(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Completed,
    /// The previous tick was still in flight
    Skipped,
    /// The channel list could not be fetched
    Aborted,
    /// The session stopped before or during the tick
    Inactive,
}

/// What one poll tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub status: PollStatus,
    pub channels: usize,
    pub dispatched: usize,
    pub executed: usize,
    pub failed: usize,
}

impl PollReport {
    fn new(status: PollStatus) -> Self {
        Self {
            status,
            channels: 0,
            dispatched: 0,
            executed: 0,
            failed: 0,
        }
    }
}

#[derive(Default)]
struct RunState {
    running: bool,
    job: Option<Uuid>,
}

struct SessionInner {
    gateway: Arc<dyn Gateway>,
    account: Account,
    registry: SharedRegistry,
    dispatcher: Dispatcher,
    scheduler: Scheduler,
    log: ActivityLog,
    poller: PollerConfig,
    state: Mutex<RunState>,
    seen: Mutex<DedupTracker>,
    /// Epoch of the running session, `STOPPED` otherwise. Ticks remember the
    /// epoch they started under and stop acting once it changes.
    active_epoch: AtomicU64,
    next_epoch: AtomicU64,
    tick_guard: Mutex<()>,
}

/// One bot: its credential-bound gateway, command registry, dedup state and
/// the recurring poll job while running.
#[derive(Clone)]
pub struct BotSession {
    inner: Arc<SessionInner>,
}

impl BotSession {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        account: Account,
        registry: CommandRegistry,
        scripts: ScriptRunner,
        scheduler: Scheduler,
        log: ActivityLog,
        poller: PollerConfig,
    ) -> Self {
        let registry: SharedRegistry = Arc::new(RwLock::new(registry));
        let executor = CommandExecutor::new(gateway.clone(), scripts);
        let dispatcher = Dispatcher::new(registry.clone(), executor, log.clone());
        Self {
            inner: Arc::new(SessionInner {
                gateway,
                account,
                registry,
                dispatcher,
                scheduler,
                log,
                poller,
                state: Mutex::new(RunState::default()),
                seen: Mutex::new(DedupTracker::new()),
                active_epoch: AtomicU64::new(STOPPED),
                next_epoch: AtomicU64::new(STOPPED),
                tick_guard: Mutex::new(()),
            }),
        }
    }

    pub fn account(&self) -> &Account {
        &self.inner.account
    }

    pub fn log(&self) -> &ActivityLog {
        &self.inner.log
    }

    pub fn interval_ms(&self) -> u64 {
        self.inner.poller.interval_ms
    }

    fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms())
    }

    pub async fn is_running(&self) -> bool {
        self.inner.state.lock().await.running
    }

    /// Stopped → Running: reset dedup state, schedule the recurring tick and
    /// poll once right away.
    pub async fn start(&self) -> Result<(), SessionError> {
        {
            let mut state = self.inner.state.lock().await;
            if state.running {
                return Err(SessionError::AlreadyRunning);
            }

            self.inner.seen.lock().await.reset();
            let epoch = self.inner.next_epoch.fetch_add(1, Ordering::SeqCst) + 1;

            let weak: Weak<SessionInner> = Arc::downgrade(&self.inner);
            let job = self
                .inner
                .scheduler
                .add_repeated_job(self.interval(), "poll-messages", move || {
                    let weak = weak.clone();
                    Box::pin(async move {
                        if let Some(inner) = weak.upgrade() {
                            BotSession { inner }.poll_once().await;
                        }
                    })
                })
                .await
                .map_err(|e| SessionError::Scheduler(format!("{:#}", e)))?;

            self.inner.active_epoch.store(epoch, Ordering::SeqCst);
            state.running = true;
            state.job = Some(job);
        }

        self.inner.log.info("Bot started - listening for commands");
        self.poll_once().await;
        Ok(())
    }

    /// Running → Stopped: cancel the recurring tick and drop dedup state.
    /// A tick already in flight finishes its current command but dispatches
    /// nothing further.
    pub async fn stop(&self) -> Result<(), SessionError> {
        let mut state = self.inner.state.lock().await;
        if !state.running {
            return Err(SessionError::NotRunning);
        }

        self.inner.active_epoch.store(STOPPED, Ordering::SeqCst);
        state.running = false;
        if let Some(job) = state.job.take() {
            if let Err(e) = self.inner.scheduler.remove_job(&job).await {
                warn!("Failed to cancel poll job: {:#}", e);
            }
        }
        self.inner.seen.lock().await.reset();
        drop(state);

        self.inner.log.info("Bot stopped");
        Ok(())
    }

    fn is_current(&self, epoch: u64) -> bool {
        epoch != STOPPED && self.inner.active_epoch.load(Ordering::SeqCst) == epoch
    }

    /// Run one poll cycle: list channels, fetch each channel's recent
    /// messages and dispatch the unseen ones not written by this account.
    pub async fn poll_once(&self) -> PollReport {
        let Ok(_guard) = self.inner.tick_guard.try_lock() else {
            debug!("Previous poll still running, skipping tick");
            return PollReport::new(PollStatus::Skipped);
        };

        let epoch = self.inner.active_epoch.load(Ordering::SeqCst);
        if !self.is_current(epoch) {
            return PollReport::new(PollStatus::Inactive);
        }

        let channels = match self.inner.gateway.list_direct_channels().await {
            Ok(channels) => channels,
            Err(e) => {
                self.inner
                    .log
                    .error(format!("Error checking messages: {}", e));
                return PollReport::new(PollStatus::Aborted);
            }
        };

        let mut report = PollReport::new(PollStatus::Completed);
        for channel in channels {
            if !self.is_current(epoch) {
                report.status = PollStatus::Inactive;
                return report;
            }

            let messages = match self
                .inner
                .gateway
                .list_recent_messages(&channel.id, self.inner.poller.message_limit)
                .await
            {
                Ok(messages) => messages,
                Err(e) => {
                    self.inner.log.error(format!(
                        "Error fetching messages for channel {}: {}",
                        channel.id, e
                    ));
                    continue;
                }
            };
            report.channels += 1;

            for message in messages {
                if message.author.id == self.inner.account.id {
                    continue;
                }
                {
                    let mut seen = self.inner.seen.lock().await;
                    if seen.has_seen(&message.id) {
                        continue;
                    }
                    seen.mark_seen(&message.id);
                }
                if !self.is_current(epoch) {
                    report.status = PollStatus::Inactive;
                    return report;
                }

                report.dispatched += 1;
                match self.inner.dispatcher.dispatch(&message).await {
                    DispatchOutcome::NoMatch => {}
                    DispatchOutcome::Executed { .. } => report.executed += 1,
                    DispatchOutcome::Failed(_) => report.failed += 1,
                }
            }
        }

        debug!(
            "Poll finished: {} channels, {} new messages, {} executed, {} failed",
            report.channels, report.dispatched, report.executed, report.failed
        );
        report
    }

    /// Snapshot of the registry in registration order
    pub async fn commands(&self) -> Vec<Command> {
        self.inner.registry.read().await.commands().to_vec()
    }

    /// Register a custom command; script bodies must compile. Returns its index.
    pub async fn add_command(&self, command: Command) -> Result<usize, RegistryError> {
        self.check_script(&command)?;
        let mut registry = self.inner.registry.write().await;
        registry.add(command)?;
        Ok(registry.len() - 1)
    }

    pub async fn replace_command(&self, index: usize, command: Command) -> Result<(), RegistryError> {
        self.check_script(&command)?;
        self.inner.registry.write().await.replace(index, command)
    }

    pub async fn remove_command(&self, index: usize) -> Result<Command, RegistryError> {
        self.inner.registry.write().await.remove(index)
    }

    fn check_script(&self, command: &Command) -> Result<(), RegistryError> {
        if let CommandBody::Script(source) = &command.body {
            self.inner
                .dispatcher
                .executor()
                .scripts()
                .check(source)
                .map_err(|reason| RegistryError::InvalidScript {
                    trigger: command.trigger(),
                    reason,
                })?;
        }
        Ok(())
    }
}
