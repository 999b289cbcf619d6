//! steward-core — shared contract for scheduled background work.
//!
//! Everything the scheduler drives or the health checker wraps is a
//! [`Task`]: a single no-argument operation returning [`RunResult`].
//! Closures of the shape `Fn() -> RunResult` are tasks, so callers can
//! hand over a raw function or a richer type (such as a health checker)
//! interchangeably.

pub mod config;
pub mod error;
pub mod task;

pub use config::{ConfigError, HealthCheckConfig, ScheduleConfig, parse_duration};
pub use error::{RunError, RunResult, panic_message};
pub use task::Task;
