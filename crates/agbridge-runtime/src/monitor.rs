use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Source of "now" for the session monitor.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Per-family supervision limits. A zero duration disables that check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub operation_timeout: Duration,
    pub initial_response_timeout: Duration,
    pub activity_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorFailure {
    /// Nothing arrived before the initial response deadline.
    NoResponse,
    /// The turn outlived the operation timeout.
    TimedOut,
    /// Output stopped for longer than the activity timeout.
    ConnectionLost,
}

impl MonitorFailure {
    pub fn message(&self) -> &'static str {
        match self {
            MonitorFailure::NoResponse => {
                "No response from backend. Check that it is installed and configured."
            }
            MonitorFailure::TimedOut => "Operation timed out.",
            MonitorFailure::ConnectionLost => "Connection lost: the backend stopped responding.",
        }
    }
}

impl fmt::Display for MonitorFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Activity and timeout bookkeeping for one live turn.
///
/// The monitor owns no timers. The turn loop sleeps until
/// [`next_deadline`](Self::next_deadline) and then calls [`poll`](Self::poll),
/// which reports a failure at most once. After `complete()` or a failure the
/// monitor is inert until the next `start()`.
pub struct SessionMonitor {
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    started_at: Option<Instant>,
    last_activity: Option<Instant>,
    completed: bool,
    failure: Option<MonitorFailure>,
}

impl SessionMonitor {
    pub fn new(config: MonitorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            started_at: None,
            last_activity: None,
            completed: false,
            failure: None,
        }
    }

    pub fn start(&mut self) {
        self.started_at = Some(self.clock.now());
        self.last_activity = None;
        self.completed = false;
        self.failure = None;
    }

    pub fn mark_activity(&mut self) {
        if self.is_armed() {
            self.last_activity = Some(self.clock.now());
        }
    }

    /// Idempotent; disarms every deadline.
    pub fn complete(&mut self) {
        self.completed = true;
    }

    /// Forget the last turn entirely.
    pub fn cleanup(&mut self) {
        self.completed = true;
        self.started_at = None;
        self.last_activity = None;
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn failure(&self) -> Option<MonitorFailure> {
        self.failure
    }

    fn is_armed(&self) -> bool {
        self.started_at.is_some() && !self.completed
    }

    fn deadlines(&self) -> [(Option<Instant>, MonitorFailure); 3] {
        let Some(started_at) = self.started_at else {
            return [(None, MonitorFailure::NoResponse); 3];
        };
        let after = |from: Instant, limit: Duration| (!limit.is_zero()).then(|| from + limit);

        let initial = match self.last_activity {
            None => after(started_at, self.config.initial_response_timeout),
            Some(_) => None,
        };
        let operation = after(started_at, self.config.operation_timeout);
        let activity = self
            .last_activity
            .and_then(|last| after(last, self.config.activity_timeout));

        [
            (initial, MonitorFailure::NoResponse),
            (operation, MonitorFailure::TimedOut),
            (activity, MonitorFailure::ConnectionLost),
        ]
    }

    /// Earliest armed deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.is_armed() {
            return None;
        }
        self.deadlines().into_iter().filter_map(|(at, _)| at).min()
    }

    /// Check deadlines against the clock. Returns the failure the first time
    /// one is reached and completes the monitor.
    pub fn poll(&mut self) -> Option<MonitorFailure> {
        if !self.is_armed() {
            return None;
        }
        let now = self.clock.now();
        let failure = self
            .deadlines()
            .into_iter()
            .find_map(|(at, failure)| at.filter(|at| now >= *at).map(|_| failure))?;

        self.completed = true;
        self.failure = Some(failure);
        Some(failure)
    }
}
