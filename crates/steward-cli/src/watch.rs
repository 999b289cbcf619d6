//! `steward watch` — log changes to files.

use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use steward_core::RunResult;
use steward_scheduler::Scheduler;
use steward_watch::FileWatcher;

pub fn scheduler(files: Vec<PathBuf>, interval: Duration) -> Scheduler {
    let count = files.len();
    let watcher = FileWatcher::new(|| -> RunResult { Ok(()) })
        .with_files(files)
        .on_file_change(|path, stat| match stat {
            Ok(meta) => info!(path = %path.display(), len = meta.len(), "file changed"),
            Err(e) => info!(path = %path.display(), error = %e, "file unreadable"),
        });

    info!(files = count, interval_ms = interval.as_millis() as u64, "watching files");
    watcher.into_scheduler(interval, Duration::ZERO)
}
