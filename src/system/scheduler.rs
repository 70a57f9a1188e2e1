//! Interval scheduler
//!
//! Tracks the periodic background jobs of the coordinator and reports which
//! are due on a tick. Intervals are measured from the last firing, not from
//! a fixed origin: if the loop stalls for several intervals (a slow upload, a
//! blocking request), the job is reported due once on resumption. Missed
//! firings are dropped, never queued.
//!
//! The scheduler only reports; the caller marks a job [`fired`] after
//! dispatching it, otherwise it is reported due again on the next tick.
//!
//! [`fired`]: IntervalScheduler::fired

use embassy_time::{Duration, Instant};
use heapless::Vec;

/// Maximum number of registered jobs
pub const MAX_TASKS: usize = 4;

/// Periodic background jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "rp2350", derive(defmt::Format))]
pub enum TaskId {
    /// Upload a frame to the backend
    CaptureUpload,
    /// Send a frame to the AI service
    Detection,
    /// Refresh parking stats from the backend
    StatsSync,
}

/// Jobs due on one tick
pub type DueTasks = Vec<TaskId, MAX_TASKS>;

/// One periodic job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTask {
    /// Job identifier
    pub id: TaskId,
    /// Minimum time between two firings
    pub interval: Duration,
    /// Last firing (boot for a job that never ran)
    pub last_fired_at: Instant,
}

impl ScheduledTask {
    fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_fired_at) >= self.interval
    }
}

/// Set of independent periodic jobs
#[derive(Debug, Clone, Default)]
pub struct IntervalScheduler {
    tasks: Vec<ScheduledTask, MAX_TASKS>,
}

impl IntervalScheduler {
    /// Empty scheduler
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Register a job, counting its first interval from boot
    ///
    /// Registering an id twice replaces its interval.
    pub fn register(&mut self, id: TaskId, interval: Duration) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
            task.interval = interval;
            return;
        }
        let task = ScheduledTask {
            id,
            interval,
            last_fired_at: Instant::from_ticks(0),
        };
        if self.tasks.push(task).is_err() {
            log_error!("Scheduler full, {:?} not registered", id);
        }
    }

    /// Whether `id` is registered
    pub fn is_registered(&self, id: TaskId) -> bool {
        self.tasks.iter().any(|t| t.id == id)
    }

    /// Jobs whose interval has elapsed at `now`, in registration order
    pub fn due_tasks(&self, now: Instant) -> DueTasks {
        let mut due = DueTasks::new();
        for task in self.tasks.iter().filter(|t| t.is_due(now)) {
            // Capacity equals the registry size, so this cannot fail
            let _ = due.push(task.id);
        }
        due
    }

    /// Mark `id` as fired at `now`
    pub fn fired(&mut self, id: TaskId, now: Instant) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
            task.last_fired_at = now;
        }
    }

    /// Registered job, if any
    pub fn task(&self, id: TaskId) -> Option<&ScheduledTask> {
        self.tasks.iter().find(|t| t.id == id)
    }
}
