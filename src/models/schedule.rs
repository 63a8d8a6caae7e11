use chrono::{DateTime, Utc};

/// Scheduling state for the warm-up loop. Lives in memory for the process
/// lifetime; a restart re-derives everything from the calendar.
#[derive(Debug, Clone)]
pub struct ScheduleState {
    /// Next time conditioning should start, or `None` when a fresh event
    /// must be fetched before anything else happens.
    pub target_time: Option<DateTime<Utc>>,
    /// Whether the conditioning command has been sent for the current target.
    pub fired: bool,
    /// When the target was last (re)computed from the calendar.
    pub last_refresh: DateTime<Utc>,
    /// True until the first successful acquisition after process start.
    pub initial_start: bool,
}

impl ScheduleState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            target_time: None,
            fired: false,
            last_refresh: now,
            initial_start: true,
        }
    }

    pub fn set_target(&mut self, target: DateTime<Utc>, now: DateTime<Utc>) {
        self.target_time = Some(target);
        self.fired = false;
        self.last_refresh = now;
        self.initial_start = false;
    }

    /// Clearing the target always clears the fired flag with it.
    pub fn reset(&mut self) {
        self.target_time = None;
        self.fired = false;
    }
}
