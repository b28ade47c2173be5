//! Deferred and repeating jobs driven by the passive scheduler.
//!
//! A job fires once its duration elapses. Retriggering jobs restart
//! instead of being removed; prolongable jobs coalesce with later
//! registrations of the same id, keeping only the newest start time. The
//! nearest upcoming deadline yields a load factor that shortens the
//! scheduler's next sleep.

use std::time::{Duration, Instant};

use tracing::warn;

use crate::element::Tree;
use crate::error::Result;

/// Behavior flags of a timer job.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JobFlags(u8);

impl JobFlags {
    /// Plain one-shot job.
    pub const NONE: Self = Self(0);
    /// A later registration with the same id replaces this job's start.
    pub const PROLONG: Self = Self(1);
    /// The job restarts after firing instead of being removed.
    pub const RETRIGGER: Self = Self(2);

    /// True when every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0 && other.0 != 0
    }
}

impl std::ops::BitOr for JobFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// The work a job performs. Returning `Ok(true)` marks the job done.
pub type TimerFn = Box<dyn FnMut(&mut Tree) -> Result<bool> + Send>;

/// A scheduled job.
pub struct TimerJob {
    /// Identity used for coalescing and failure logs.
    pub id: String,
    /// When the current countdown began.
    pub start: Instant,
    /// How long after `start` the job fires.
    pub duration: Duration,
    /// Behavior flags.
    pub flags: JobFlags,
    job: TimerFn,
}

impl TimerJob {
    /// Create a job starting now.
    pub fn new(
        id: impl Into<String>,
        duration: Duration,
        flags: JobFlags,
        job: TimerFn,
    ) -> Self {
        Self {
            id: id.into(),
            start: Instant::now(),
            duration,
            flags,
            job,
        }
    }

    /// Create a job with an explicit start, for deterministic tests.
    pub fn starting_at(
        id: impl Into<String>,
        start: Instant,
        duration: Duration,
        flags: JobFlags,
        job: TimerFn,
    ) -> Self {
        Self {
            id: id.into(),
            start,
            duration,
            flags,
            job,
        }
    }
}

impl std::fmt::Debug for TimerJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerJob")
            .field("id", &self.id)
            .field("duration", &self.duration)
            .field("flags", &self.flags)
            .finish()
    }
}

/// The scheduler's job list.
#[derive(Debug, Default)]
pub struct TimerList {
    jobs: Vec<TimerJob>,
}

impl TimerList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a job.
    pub fn add(&mut self, job: TimerJob) {
        self.jobs.push(job);
    }

    /// Number of pending jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns true when no jobs are pending.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Merge pairs of prolongable jobs sharing an id: the later start time
    /// wins and the older entry is dropped.
    pub fn coalesce(&mut self) {
        let mut i = 0;
        while i < self.jobs.len() {
            let mut j = i + 1;
            while j < self.jobs.len() {
                let both_prolong = self.jobs[i].flags.contains(JobFlags::PROLONG)
                    && self.jobs[j].flags.contains(JobFlags::PROLONG);
                if both_prolong && self.jobs[i].id == self.jobs[j].id {
                    // The later registration carries the fresher start.
                    self.jobs[i].start = self.jobs[j].start;
                    self.jobs.remove(j);
                } else {
                    j += 1;
                }
            }
            i += 1;
        }
    }

    /// Run one scheduler pass at `now`: coalesce, fire every expired job,
    /// and return the time left until the nearest remaining deadline.
    pub fn tick(&mut self, tree: &mut Tree, now: Instant) -> Option<Duration> {
        self.coalesce();

        let mut index = 0;
        while index < self.jobs.len() {
            let elapsed = now.saturating_duration_since(self.jobs[index].start);
            if elapsed < self.jobs[index].duration {
                index += 1;
                continue;
            }

            let outcome = (self.jobs[index].job)(tree);
            if self.jobs[index].flags.contains(JobFlags::RETRIGGER) {
                // Retriggers restart regardless of the outcome.
                self.jobs[index].start = now;
                if let Err(error) = outcome {
                    warn!(job = %self.jobs[index].id, %error, "timer job failed");
                }
                index += 1;
                continue;
            }
            match outcome {
                Ok(true) => {
                    self.jobs.remove(index);
                }
                Ok(false) => {
                    index += 1;
                }
                Err(error) => {
                    warn!(job = %self.jobs[index].id, %error, "timer job failed");
                    index += 1;
                }
            }
        }

        self.jobs
            .iter()
            .map(|job| {
                job.duration
                    .saturating_sub(now.saturating_duration_since(job.start))
            })
            .min()
    }
}

/// Map the nearest deadline onto a load factor in `[0, 1]`: imminent work
/// pushes the factor toward one, distant work toward zero.
pub fn load_factor(min_update: Duration, max_update: Duration, shortest: Duration) -> f32 {
    let span = max_update.saturating_sub(min_update).as_millis() as f32;
    if span <= 0.0 {
        return 1.0;
    }
    let offset = shortest.saturating_sub(min_update).as_millis() as f32;
    (1.0 - offset / span).clamp(0.0, 1.0)
}

/// The passive scheduler's next sleep: interpolated between the update
/// speed bounds by the load factor.
pub fn sleep_for(min_update: Duration, max_update: Duration, load: f32) -> Duration {
    let span = max_update.saturating_sub(min_update);
    let scaled = span.mul_f32((1.0 - load).clamp(0.0, 1.0));
    min_update + scaled
}
