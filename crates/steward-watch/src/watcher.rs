//! Metadata-polling file watcher.
//!
//! A change is a new modification time or size, or a file that could be
//! read before and now cannot. Some details:
//! - the first poll records a baseline and never runs the inner task
//! - a file that has never been readable is not reported
//! - an unreadable file is reported once, not on every poll
//! - only the inner task's errors count as failures; stat errors do not

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use steward_core::{RunResult, Task};
use steward_scheduler::Scheduler;

/// Observer for individual file changes.
pub type ChangeCallback = Box<dyn Fn(&Path, Result<&Metadata, &io::Error>) + Send + Sync>;

/// What a poll compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl FileStamp {
    fn of(meta: &Metadata) -> Self {
        Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        }
    }
}

#[derive(Debug)]
struct WatchedFile {
    path: PathBuf,
    /// Stamp from the last successful stat, if the file is readable.
    last: Option<FileStamp>,
}

#[derive(Debug, Default)]
struct WatchState {
    files: Vec<WatchedFile>,
    baseline_taken: bool,
}

/// Runs a task whenever one of the watched files changes.
pub struct FileWatcher {
    on_change: Box<dyn Task>,
    on_file_change: Option<ChangeCallback>,
    state: Mutex<WatchState>,
}

impl FileWatcher {
    /// Create a watcher that runs `on_change` after a poll detects changes.
    pub fn new<T: Task>(on_change: T) -> Self {
        Self {
            on_change: Box::new(on_change),
            on_file_change: None,
            state: Mutex::new(WatchState::default()),
        }
    }

    /// Add files to watch. Empty paths are ignored.
    ///
    /// Files added after the baseline poll are reported on their next poll.
    pub fn add_files<I, P>(&mut self, files: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let state = self.state.get_mut().unwrap();
        for file in files {
            let path = file.as_ref();
            if path.as_os_str().is_empty() {
                continue;
            }
            state.files.push(WatchedFile {
                path: path.to_path_buf(),
                last: None,
            });
        }
    }

    /// Builder form of [`add_files`](Self::add_files).
    pub fn with_files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.add_files(files);
        self
    }

    /// Observe each changed file, including the baseline poll.
    pub fn on_file_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Path, Result<&Metadata, &io::Error>) + Send + Sync + 'static,
    {
        self.on_file_change = Some(Box::new(callback));
        self
    }

    pub fn watched_files(&self) -> Vec<PathBuf> {
        let state = self.state.lock().unwrap();
        state.files.iter().map(|f| f.path.clone()).collect()
    }

    /// Drive this watcher from a scheduler polling at `run_interval`.
    ///
    /// The returned scheduler is not started.
    pub fn into_scheduler(self, run_interval: Duration, retry_interval: Duration) -> Scheduler {
        Scheduler::new(Arc::new(self), run_interval, retry_interval)
    }

    /// Stat every watched file once; run the inner task if anything changed
    /// since the last poll.
    pub fn poll(&self) -> RunResult {
        let (changes, baseline) = {
            let mut state = self.state.lock().unwrap();
            let changes = Self::scan(&mut state.files);
            let baseline = !std::mem::replace(&mut state.baseline_taken, true);
            (changes, baseline)
        };

        if let Some(ref cb) = self.on_file_change {
            for (path, stat) in &changes {
                cb(path.as_path(), stat.as_ref());
            }
        }

        if changes.is_empty() || baseline {
            return Ok(());
        }
        debug!(changed = changes.len(), "watched files changed");
        self.on_change.run()
    }

    fn scan(files: &mut [WatchedFile]) -> Vec<(PathBuf, io::Result<Metadata>)> {
        let mut changes = Vec::new();
        for file in files {
            match fs::metadata(&file.path) {
                Ok(meta) => {
                    let stamp = FileStamp::of(&meta);
                    if file.last != Some(stamp) {
                        debug!(path = %file.path.display(), len = stamp.len, "file changed");
                        file.last = Some(stamp);
                        changes.push((file.path.clone(), Ok(meta)));
                    }
                }
                Err(e) => {
                    // Never readable, or already reported.
                    if file.last.is_none() {
                        continue;
                    }
                    warn!(path = %file.path.display(), error = %e, "watched file unreadable");
                    file.last = None;
                    changes.push((file.path.clone(), Err(e)));
                }
            }
        }
        changes
    }
}

impl Task for FileWatcher {
    fn run(&self) -> RunResult {
        self.poll()
    }
}
