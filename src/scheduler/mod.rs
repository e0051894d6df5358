use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Recurring background jobs, each driven by its own interval timer.
///
/// Clones share the same job table.
#[derive(Clone, Default)]
pub struct Scheduler {
    shutdown: CancellationToken,
    jobs: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job that runs every `every`, first firing one interval from now.
    /// A run that overruns the interval delays the next one instead of
    /// bunching up. Returns the id needed to remove it again.
    pub async fn add_repeated_job<F>(&self, every: Duration, name: &str, task: F) -> Result<Uuid>
    where
        F: Fn() -> JobFuture + Send + Sync + 'static,
    {
        if every.is_zero() {
            anyhow::bail!("Repeat interval for job '{}' must be non-zero", name);
        }
        if self.shutdown.is_cancelled() {
            anyhow::bail!("Scheduler is shut down, cannot add job '{}'", name);
        }

        let id = Uuid::new_v4();
        let cancel = self.shutdown.child_token();
        self.jobs.lock().await.insert(id, cancel.clone());

        let job_name = name.to_string();
        tokio::spawn(async move {
            let mut tick = interval_at(Instant::now() + every, every);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        debug!("Running scheduled task: {}", job_name);
                        task().await;
                    }
                }
            }
            debug!("Scheduled task '{}' cancelled", job_name);
        });

        info!("Scheduled task '{}' every {:?}", name, every);
        Ok(id)
    }

    /// Cancel a previously added job. A run already in progress finishes.
    pub async fn remove_job(&self, id: &Uuid) -> Result<()> {
        let cancel = self
            .jobs
            .lock()
            .await
            .remove(id)
            .with_context(|| format!("Failed to remove job: {} is not scheduled", id))?;
        cancel.cancel();
        info!("Removed scheduled task {}", id);
        Ok(())
    }

    /// Cancel every job and refuse new ones
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.jobs.lock().await.clear();
        info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_job(runs: &Arc<AtomicUsize>) -> impl Fn() -> JobFuture + Send + Sync + 'static {
        let runs = runs.clone();
        move || {
            let runs = runs.clone();
            Box::pin(async move {
                runs.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sub_second_interval_is_honored() {
        let scheduler = Scheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let id = scheduler
            .add_repeated_job(Duration::from_millis(100), "counter", counting_job(&runs))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1050)).await;
        let seen = runs.load(Ordering::SeqCst);
        assert!((8..=11).contains(&seen), "ran {} times", seen);

        scheduler.remove_job(&id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let after_remove = runs.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_remove);
    }

    #[tokio::test]
    async fn test_first_run_waits_one_interval() {
        let scheduler = Scheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        scheduler
            .add_repeated_job(Duration::from_millis(300), "late", counting_job(&runs))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remove_unknown_job_fails() {
        let scheduler = Scheduler::new();
        assert!(scheduler.remove_job(&Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_jobs_and_rejects_new_ones() {
        let scheduler = Scheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        scheduler
            .add_repeated_job(Duration::from_millis(50), "counter", counting_job(&runs))
            .await
            .unwrap();

        scheduler.shutdown().await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(scheduler
            .add_repeated_job(Duration::from_millis(50), "late", counting_job(&runs))
            .await
            .is_err());
    }
}
