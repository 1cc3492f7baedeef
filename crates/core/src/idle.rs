//! Idle-reclamation policy for the job loop.
//!
//! Every consecutive "no job available" poll response advances an
//! [`IdleTracker`]. The [`IdlePolicy`] maps accumulated idle time onto
//! staged actions: cheap short sleeps at first, then longer sleeps with
//! a soft engine-cache flush, and finally a full process restart to
//! reclaim allocator fragmentation the soft flush cannot fix.
//!
//! The restart band only fires when a workflow was activated at some
//! point (a worker that never loaded models has nothing to reclaim),
//! and at most once per idle episode.

use std::time::Duration;

/// Idle time below which the loop just naps briefly between polls.
pub const SHORT_BAND: Duration = Duration::from_secs(30);

/// Idle time after which the loop sleeps longer and asks the engine to
/// drop its allocator cache.
pub const FLUSH_AFTER: Duration = Duration::from_secs(15 * 60);

/// Idle time after which the process restarts itself, provided a
/// workflow was ever activated.
pub const RESTART_AFTER: Duration = Duration::from_secs(60 * 60);

/// Sleep used inside the short band.
pub const SHORT_SLEEP: Duration = Duration::from_secs(2);

/// Sleep used between the short band and the flush threshold.
pub const SETTLE_SLEEP: Duration = Duration::from_secs(10);

/// Sleep used once the flush threshold has been crossed.
pub const FLUSH_SLEEP: Duration = Duration::from_secs(30);

/// What the job loop should do after a "no job" poll response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleAction {
    /// Sleep for the given duration, nothing else.
    Sleep(Duration),
    /// Ask the engine for a soft cache flush, then sleep.
    FlushAndSleep(Duration),
    /// Exit the loop and restart the process to reclaim GPU memory.
    Restart,
}

/// Threshold configuration for the idle bands.
///
/// The defaults match the production values; the worker exposes them
/// through environment variables for tuning.
#[derive(Debug, Clone)]
pub struct IdlePolicy {
    pub short_band: Duration,
    pub flush_after: Duration,
    pub restart_after: Duration,
}

impl Default for IdlePolicy {
    fn default() -> Self {
        Self {
            short_band: SHORT_BAND,
            flush_after: FLUSH_AFTER,
            restart_after: RESTART_AFTER,
        }
    }
}

/// Tracks how long the worker has been without a job.
///
/// Idle time is accumulated from the sleeps the policy hands out, so a
/// fixed sequence of "no job" responses always maps to the same
/// sequence of actions -- there is no wall-clock dependency.
#[derive(Debug, Default)]
pub struct IdleTracker {
    idle_for: Duration,
    consecutive_no_job: u32,
    workflow_activated: bool,
    restart_requested: bool,
}

impl IdleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a workflow completed its load phase at least once.
    ///
    /// Restarting exists purely to reclaim GPU memory, so it stays
    /// disabled until this is called.
    pub fn mark_activated(&mut self) {
        self.workflow_activated = true;
    }

    /// Record a received job: ends the idle episode.
    pub fn reset(&mut self) {
        self.idle_for = Duration::ZERO;
        self.consecutive_no_job = 0;
        self.restart_requested = false;
    }

    /// Number of consecutive "no job" responses in this episode.
    pub fn consecutive_no_job(&self) -> u32 {
        self.consecutive_no_job
    }

    /// Total idle time attributed to this episode.
    pub fn idle_for(&self) -> Duration {
        self.idle_for
    }

    /// Record a "no job" response and pick the next action.
    ///
    /// Sleep durations are added to the tracked idle time before
    /// returning, so callers just execute the returned action.
    pub fn record_no_job(&mut self, policy: &IdlePolicy) -> IdleAction {
        self.consecutive_no_job += 1;

        if self.idle_for >= policy.restart_after
            && self.workflow_activated
            && !self.restart_requested
        {
            self.restart_requested = true;
            return IdleAction::Restart;
        }

        let action = if self.idle_for >= policy.flush_after {
            IdleAction::FlushAndSleep(FLUSH_SLEEP)
        } else if self.idle_for >= policy.short_band {
            IdleAction::Sleep(SETTLE_SLEEP)
        } else {
            IdleAction::Sleep(SHORT_SLEEP)
        };

        match action {
            IdleAction::Sleep(d) | IdleAction::FlushAndSleep(d) => self.idle_for += d,
            IdleAction::Restart => {}
        }
        action
    }
}
