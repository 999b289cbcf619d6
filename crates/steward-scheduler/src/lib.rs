//! steward-scheduler — a single background loop driving one [`Task`].
//!
//! Runs are started in three ways:
//! - at each run interval
//! - at the retry interval, if the previous run failed
//! - on demand via [`Scheduler::trigger_run`]
//!
//! # Architecture
//!
//! ```text
//! Scheduler
//!   ├── start() → tokio task (loop)
//!   │   ├── select! { stop, trigger slot (cap 1), timer }
//!   │   ├── spawn_blocking(Task::run) → RunResult / panic
//!   │   └── RetryPolicy::next() → next wait
//!   ├── trigger_run() → try_send on the trigger slot
//!   └── stop() → watch signal, checked again before every run
//! ```
//!
//! A typical usage is a run interval of 5 minutes with a retry interval
//! of 5 seconds.
//!
//! [`Task`]: steward_core::Task

pub mod retry;
pub mod scheduler;

pub use retry::RetryPolicy;
pub use scheduler::{PanicHandler, Scheduler};
