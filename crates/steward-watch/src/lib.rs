//! steward-watch — poll files and react to changes.
//!
//! [`FileWatcher`] is a [`Task`](steward_core::Task) that compares each
//! watched file's modification time and size with the previous poll and
//! runs an inner task when something changed. It is meant to be driven
//! by a [`Scheduler`](steward_scheduler::Scheduler), which supplies the
//! poll interval, retries and on-demand polls.

pub mod watcher;

pub use watcher::{ChangeCallback, FileWatcher};
