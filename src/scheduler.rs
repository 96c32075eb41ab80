//! Single-flight recurring scheduler.
//!
//! A run starts immediately on [`Scheduler::start`]; the next one is scheduled
//! `interval` after the previous run *finishes*, so runs never overlap and slow
//! runs push the schedule back.
//!
//! ```text
//! Idle --start--> Running --done--> Scheduled --interval--> Running ...
//!                    |                  |
//!                  stop               stop
//!                    v                  v
//!          finish run, then Idle       Idle (timer cancelled)
//! ```
//!
//! Starting an active scheduler is a no-op. Stopping never interrupts a run in flight.

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// The work repeated by a [`Scheduler`].
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    async fn run(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scheduled,
    Running,
}

#[derive(Debug)]
struct Inner {
    state: SchedulerState,
    keep_running: bool,
    /// Bumped whenever a chain of runs is started or cancelled; a loop whose
    /// epoch is stale exits.
    epoch: u64,
    task: Option<JoinHandle<()>>,
}

pub struct Scheduler {
    job: Arc<dyn ScheduledJob>,
    interval: Duration,
    inner: Arc<Mutex<Inner>>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Whether the loop for `epoch` may continue; marks the scheduler idle when not.
fn should_continue(inner: &mut Inner, epoch: u64) -> bool {
    if inner.epoch != epoch {
        return false;
    }
    if !inner.keep_running {
        inner.state = SchedulerState::Idle;
        inner.task = None;
        return false;
    }
    true
}

async fn run_loop(job: Arc<dyn ScheduledJob>, interval: Duration, inner: Arc<Mutex<Inner>>, epoch: u64) {
    loop {
        // A panicking run still counts as finished; the chain goes on.
        if let Err(panic) = AssertUnwindSafe(job.run()).catch_unwind().await {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_default();
            error!(%reason, "Scheduled run panicked");
        }

        {
            let mut guard = lock(&inner);
            if !should_continue(&mut guard, epoch) {
                info!("Scheduler stopped after run");
                return;
            }
            guard.state = SchedulerState::Scheduled;
        }
        debug!(interval_secs = interval.as_secs(), "Next run scheduled");

        tokio::time::sleep(interval).await;

        {
            let mut guard = lock(&inner);
            if !should_continue(&mut guard, epoch) {
                return;
            }
            guard.state = SchedulerState::Running;
        }
    }
}

impl Scheduler {
    pub fn new(job: Arc<dyn ScheduledJob>, interval: Duration) -> Self {
        Self {
            job,
            interval,
            inner: Arc::new(Mutex::new(Inner {
                state: SchedulerState::Idle,
                keep_running: false,
                epoch: 0,
                task: None,
            })),
        }
    }

    pub fn state(&self) -> SchedulerState {
        lock(&self.inner).state
    }

    /// Run now and keep running every `interval`. No-op when already active.
    pub fn start(&self) {
        let mut inner = lock(&self.inner);
        inner.keep_running = true;
        if inner.state != SchedulerState::Idle {
            debug!(state = ?inner.state, "Scheduler already active");
            return;
        }
        inner.epoch += 1;
        inner.state = SchedulerState::Running;
        let epoch = inner.epoch;
        info!(interval_secs = self.interval.as_secs(), "Scheduler started");
        inner.task = Some(tokio::spawn(run_loop(
            self.job.clone(),
            self.interval,
            self.inner.clone(),
            epoch,
        )));
    }

    /// Cancel future runs. A run in flight is allowed to finish.
    pub fn stop(&self) {
        let mut inner = lock(&self.inner);
        inner.keep_running = false;
        match inner.state {
            SchedulerState::Scheduled => {
                inner.epoch += 1;
                if let Some(task) = inner.task.take() {
                    task.abort();
                }
                inner.state = SchedulerState::Idle;
                info!("Scheduler stopped; pending run cancelled");
            }
            SchedulerState::Running => info!("Scheduler stopping after the current run"),
            SchedulerState::Idle => {}
        }
    }

    /// Stop, then wait for a run in flight to complete.
    pub async fn shutdown(&self) {
        self.stop();
        let task = lock(&self.inner).task.take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}
