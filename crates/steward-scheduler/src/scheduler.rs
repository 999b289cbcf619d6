//! Scheduler — runs a single task from one background loop.
//!
//! The loop waits on whichever comes first of the stop signal, a queued
//! trigger, or the current interval timer. It runs the task once per wake
//! (never in parallel) and picks the next wait from the outcome.

use std::any::Any;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, warn};

use steward_core::{ConfigError, RunError, RunResult, ScheduleConfig, Task, panic_message};

use crate::retry::RetryPolicy;

/// Observer for panics recovered from the task.
///
/// Receives the raw panic payload. Must not call `start` or `stop` on the
/// scheduler that invoked it.
pub type PanicHandler = Arc<dyn Fn(&(dyn Any + Send)) + Send + Sync>;

/// Runs one [`Task`] at an interval, on retry, or on demand.
///
/// Construction fixes all parameters. [`start`](Self::start) spawns the
/// loop and queues one immediate run; [`stop`](Self::stop) ends it. A
/// stopped scheduler cannot be restarted.
pub struct Scheduler {
    task: Arc<dyn Task>,
    policy: RetryPolicy,
    recover_panics: bool,
    on_panic: Option<PanicHandler>,
    /// Trigger slot sender; capacity one, so redundant triggers coalesce.
    trigger_tx: mpsc::Sender<()>,
    /// Receiver half, handed to the loop on start.
    trigger_rx: Mutex<Option<mpsc::Receiver<()>>>,
    stop_tx: watch::Sender<bool>,
    started: AtomicBool,
    stopped: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler for `task`.
    ///
    /// A zero `run_interval` means the task only runs when triggered. A
    /// `retry_interval` larger than `run_interval` disables retry.
    pub fn new(task: Arc<dyn Task>, run_interval: Duration, retry_interval: Duration) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (stop_tx, _) = watch::channel(false);

        Self {
            task,
            policy: RetryPolicy::new(run_interval, retry_interval, true),
            recover_panics: true,
            on_panic: None,
            trigger_tx,
            trigger_rx: Mutex::new(Some(trigger_rx)),
            stop_tx,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            handle: Mutex::new(None),
        }
    }

    /// Create a scheduler from serialized parameters.
    pub fn from_config(task: Arc<dyn Task>, config: &ScheduleConfig) -> Result<Self, ConfigError> {
        let scheduler = Self::new(task, config.run_interval()?, config.retry_interval()?)
            .with_backoff(config.backoff)
            .with_panic_recovery(config.recover_panics);
        Ok(scheduler)
    }

    /// Enable or disable doubling of the retry interval (enabled by default).
    pub fn with_backoff(mut self, backoff: bool) -> Self {
        self.policy = RetryPolicy::new(
            self.policy.run_interval(),
            self.policy.retry_interval(),
            backoff,
        );
        self
    }

    /// Enable or disable panic recovery (enabled by default).
    ///
    /// Without recovery a panicking task ends the loop for good.
    pub fn with_panic_recovery(mut self, recover: bool) -> Self {
        self.recover_panics = recover;
        self
    }

    /// Observe recovered panics instead of logging them.
    ///
    /// The handler replaces this crate's `error!` log only. The process
    /// panic hook still runs when the task panics (the default hook prints
    /// the message to stderr); install a custom hook with
    /// [`std::panic::set_hook`] to silence it.
    pub fn with_panic_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&(dyn Any + Send)) + Send + Sync + 'static,
    {
        self.on_panic = Some(Arc::new(handler));
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Start the loop. Only the first call has any effect.
    ///
    /// Must be called from within a tokio runtime; otherwise nothing is
    /// started and a warning is logged.
    pub fn start(&self) {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, "scheduler start requires a tokio runtime");
                return;
            }
        };

        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let Some(trigger_rx) = self.trigger_rx.lock().unwrap().take() else {
            return;
        };

        // Run once at startup; the timer is armed after that first run.
        self.trigger_run();

        let run_loop = RunLoop {
            task: Arc::clone(&self.task),
            policy: self.policy,
            recover_panics: self.recover_panics,
            on_panic: self.on_panic.clone(),
            trigger_rx,
            stop_rx: self.stop_tx.subscribe(),
            current: Duration::ZERO,
        };

        let handle = runtime.spawn(run_loop.run());
        *self.handle.lock().unwrap() = Some(handle);

        debug!(
            run_ms = self.policy.run_interval().as_millis() as u64,
            retry_ms = self.policy.retry_interval().as_millis() as u64,
            backoff = self.policy.backoff(),
            "scheduler started"
        );
    }

    /// Queue a run as soon as the loop is free. Never blocks; does nothing
    /// if a run is already queued.
    pub fn trigger_run(&self) {
        // Full means a run is already pending; closed means the loop is gone.
        let _ = self.trigger_tx.try_send(());
    }

    /// Stop the loop. A run already in progress finishes, but no new run
    /// begins. Only the first call has any effect.
    pub fn stop(&self) {
        if self
            .stopped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.stop_tx.send_replace(true);
        debug!("scheduler stop requested");
    }

    /// Whether the loop is currently alive.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Wait for the loop to exit. Returns immediately if it was never
    /// started or has already been joined.
    ///
    /// Call after [`stop`](Self::stop) for a bounded shutdown (bounded by
    /// the duration of an in-flight run).
    pub async fn join(&self) {
        let handle = self.handle.lock().unwrap().take();
        let Some(handle) = handle else {
            return;
        };

        match handle.await {
            Ok(()) => {}
            Err(e) if e.is_panic() => {
                let payload = e.into_panic();
                error!(panic = %panic_message(payload.as_ref()), "scheduler loop ended by panic");
            }
            Err(_cancelled) => debug!("scheduler loop cancelled"),
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Mark stopped so a run racing with the drop is skipped.
        self.stop_tx.send_replace(true);
    }
}

/// State owned by the background loop.
struct RunLoop {
    task: Arc<dyn Task>,
    policy: RetryPolicy,
    recover_panics: bool,
    on_panic: Option<PanicHandler>,
    trigger_rx: mpsc::Receiver<()>,
    stop_rx: watch::Receiver<bool>,
    /// Wait used before the next run; zero disables the timer.
    current: Duration,
}

impl RunLoop {
    async fn run(mut self) {
        loop {
            let current = self.current;
            let timer = async move {
                if current.is_zero() {
                    std::future::pending::<()>().await;
                } else {
                    tokio::time::sleep(current).await;
                }
            };

            tokio::select! {
                biased;
                _ = stop_requested(&mut self.stop_rx) => break,
                Some(()) = self.trigger_rx.recv() => {}
                _ = timer => {}
            }

            // Stop may have raced with the trigger or timer.
            if *self.stop_rx.borrow() {
                break;
            }

            let task = Arc::clone(&self.task);
            let joined = tokio::task::spawn_blocking(move || task.run()).await;
            let Some(outcome) = self.settle(joined) else {
                // Blocking pool cancelled: the runtime is shutting down.
                break;
            };

            if let Err(e) = &outcome {
                warn!(error = %e, "scheduled run failed");
            }
            self.current = self.policy.next(self.current, outcome.is_err());
        }

        debug!("scheduler loop exited");
    }

    /// Turn a finished run into its outcome, recovering panics unless
    /// disabled.
    fn settle(&self, joined: Result<RunResult, JoinError>) -> Option<RunResult> {
        match joined {
            Ok(outcome) => Some(outcome),
            Err(e) if e.is_panic() => {
                let payload = e.into_panic();
                if !self.recover_panics {
                    panic::resume_unwind(payload);
                }

                let message = panic_message(payload.as_ref());
                match &self.on_panic {
                    Some(handler) => handler(payload.as_ref()),
                    None => error!(panic = %message, "recovered panic in scheduled task"),
                }
                Some(Err(RunError::Panicked(message)))
            }
            Err(_cancelled) => None,
        }
    }
}

/// Resolves once stop has been requested or the scheduler is gone.
async fn stop_requested(stop_rx: &mut watch::Receiver<bool>) {
    let _ = stop_rx.wait_for(|stopped| *stopped).await;
}
