//! Threshold-based health state machine.
//!
//! Each observation runs the wrapped check once, then updates the state
//! under a single write lock. Transition callbacks run after the lock is
//! released, so they may read the checker without deadlocking.

use std::sync::RwLock;

use tracing::{debug, info, warn};

use steward_core::{HealthCheckConfig, RunError, RunResult, Task};

/// Called when the state becomes up, with (successes, failures).
pub type UpCallback = Box<dyn Fn(u32, u32) + Send + Sync>;

/// Called when the state becomes down, with (successes, failures) and the
/// failure that caused it. The error is `None` when announced by a reset.
pub type DownCallback = Box<dyn Fn(u32, u32, Option<&RunError>) + Send + Sync>;

/// State and last error, read together.
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub up: bool,
    pub last_error: Option<RunError>,
}

/// Mutable state, only touched under the checker's lock.
#[derive(Debug)]
struct HealthState {
    up: bool,
    /// Consecutive successes.
    ups: u32,
    /// Consecutive failures.
    downs: u32,
    last_error: Option<RunError>,
    first_run: bool,
}

impl HealthState {
    fn new(up: bool) -> Self {
        Self {
            up,
            ups: 0,
            downs: 0,
            last_error: None,
            first_run: true,
        }
    }
}

/// A state change to announce once the lock is released.
#[derive(Debug)]
enum Transition {
    Up { ups: u32, downs: u32 },
    Down { ups: u32, downs: u32, error: Option<RunError> },
}

/// Tracks consecutive check outcomes and flips between up and down once a
/// threshold is reached.
pub struct HealthChecker {
    check: Box<dyn Task>,
    /// Successes needed to go from down to up.
    up_threshold: u32,
    /// Failures needed to go from up to down.
    down_threshold: u32,
    /// The first observation after construction or reset sets the state.
    fast_start: bool,
    state: RwLock<HealthState>,
    on_up: Option<UpCallback>,
    on_down: Option<DownCallback>,
}

impl HealthChecker {
    /// Create a checker around `check`.
    ///
    /// `initial_up` is the state before any observation. Thresholds below
    /// 1 are raised to 1, which means no debouncing in that direction.
    pub fn new<T: Task>(
        check: T,
        initial_up: bool,
        up_threshold: u32,
        down_threshold: u32,
    ) -> Self {
        Self {
            check: Box::new(check),
            up_threshold: up_threshold.max(1),
            down_threshold: down_threshold.max(1),
            fast_start: false,
            state: RwLock::new(HealthState::new(initial_up)),
            on_up: None,
            on_down: None,
        }
    }

    /// Create a checker from serialized parameters.
    pub fn from_config<T: Task>(check: T, config: &HealthCheckConfig) -> Self {
        Self::new(
            check,
            config.initial_up,
            config.up_threshold,
            config.down_threshold,
        )
        .with_fast_start(config.fast_start)
    }

    /// Let the first observation (after construction or reset) set the
    /// state directly, ignoring thresholds.
    pub fn with_fast_start(mut self, fast_start: bool) -> Self {
        self.fast_start = fast_start;
        self
    }

    /// Set the callback fired when the state becomes up.
    pub fn on_up<F>(mut self, callback: F) -> Self
    where
        F: Fn(u32, u32) + Send + Sync + 'static,
    {
        self.on_up = Some(Box::new(callback));
        self
    }

    /// Set the callback fired when the state becomes down.
    pub fn on_down<F>(mut self, callback: F) -> Self
    where
        F: Fn(u32, u32, Option<&RunError>) + Send + Sync + 'static,
    {
        self.on_down = Some(Box::new(callback));
        self
    }

    pub fn up_threshold(&self) -> u32 {
        self.up_threshold
    }

    pub fn down_threshold(&self) -> u32 {
        self.down_threshold
    }

    /// Run the check once and record its outcome.
    ///
    /// Returns the check's own outcome unchanged.
    pub fn observe(&self) -> RunResult {
        let outcome = self.check.run();

        let transition = {
            let mut state = self.state.write().unwrap();
            self.record(&mut state, &outcome)
        };
        if let Some(transition) = transition {
            self.announce(transition);
        }

        outcome
    }

    /// Current state, up (true) or down (false).
    pub fn is_up(&self) -> bool {
        self.state.read().unwrap().up
    }

    /// Error from the most recent failed observation since construction or
    /// the last reset.
    pub fn last_error(&self) -> Option<RunError> {
        self.state.read().unwrap().last_error.clone()
    }

    /// State and last error from the same observation.
    pub fn snapshot(&self) -> HealthSnapshot {
        let state = self.state.read().unwrap();
        HealthSnapshot {
            up: state.up,
            last_error: state.last_error.clone(),
        }
    }

    /// Set the state, clear counters and last error, and re-arm fast start.
    ///
    /// Fires the callback for the new state with counts of zero. The
    /// callback runs after the lock is released, so callbacks from a
    /// concurrent `reset` and `observe` are not ordered with respect to
    /// the state changes they announce.
    pub fn reset(&self, up: bool) {
        *self.state.write().unwrap() = HealthState::new(up);
        debug!(up, "health state reset");

        let transition = if up {
            Transition::Up { ups: 0, downs: 0 }
        } else {
            Transition::Down {
                ups: 0,
                downs: 0,
                error: None,
            }
        };
        self.fire(transition);
    }

    fn record(&self, state: &mut HealthState, outcome: &RunResult) -> Option<Transition> {
        let fast_start = self.fast_start && state.first_run;
        state.first_run = false;

        match outcome {
            Err(e) => {
                state.downs = state.downs.saturating_add(1);
                state.last_error = Some(e.clone());

                if !state.up {
                    // Still down: any progress towards up is lost.
                    state.ups = 0;
                    None
                } else if fast_start || state.downs >= self.down_threshold {
                    state.up = false;
                    state.ups = 0;
                    Some(Transition::Down {
                        ups: state.ups,
                        downs: state.downs,
                        error: Some(e.clone()),
                    })
                } else {
                    None
                }
            }
            Ok(()) => {
                state.ups = state.ups.saturating_add(1);

                if state.up {
                    state.downs = 0;
                    None
                } else if fast_start || state.ups >= self.up_threshold {
                    state.up = true;
                    state.downs = 0;
                    Some(Transition::Up {
                        ups: state.ups,
                        downs: state.downs,
                    })
                } else {
                    None
                }
            }
        }
    }

    fn announce(&self, transition: Transition) {
        match &transition {
            Transition::Up { ups, downs } => {
                info!(ups, downs, threshold = self.up_threshold, "health state up");
            }
            Transition::Down { ups, downs, error } => {
                let error = error.as_ref().map(ToString::to_string).unwrap_or_default();
                warn!(ups, downs, threshold = self.down_threshold, %error, "health state down");
            }
        }
        self.fire(transition);
    }

    fn fire(&self, transition: Transition) {
        match transition {
            Transition::Up { ups, downs } => {
                if let Some(ref cb) = self.on_up {
                    cb(ups, downs);
                }
            }
            Transition::Down { ups, downs, error } => {
                if let Some(ref cb) = self.on_down {
                    cb(ups, downs, error.as_ref());
                }
            }
        }
    }
}

impl Task for HealthChecker {
    fn run(&self) -> RunResult {
        self.observe()
    }
}

impl std::fmt::Debug for HealthChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthChecker")
            .field("up_threshold", &self.up_threshold)
            .field("down_threshold", &self.down_threshold)
            .field("fast_start", &self.fast_start)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
