//! Timers and cooldowns.
//!
//! A [`Timer`] is just a "ready at" timestamp. Cooldowns pair a timer with a
//! duration; several spells may share one timer (shared cooldown groups,
//! the GCD).

use crate::simulation::Simulation;
use crate::unit::UnitId;
use std::time::Duration;

/// Handle to a timer owned by a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub(crate) usize);

/// A monotonic "ready at" timestamp.
///
/// # Examples
///
/// ```rust
/// use simkernel::Timer;
/// use std::time::Duration;
///
/// let mut timer = Timer::new();
/// assert!(timer.is_ready(Duration::ZERO));
///
/// timer.use_for(Duration::ZERO, Duration::from_secs(6));
/// assert!(!timer.is_ready(Duration::from_secs(3)));
/// assert!(timer.is_ready(Duration::from_secs(6)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timer {
    ready_at: Duration,
}

impl Timer {
    /// A timer that is ready from the start of the trial.
    pub const fn new() -> Self {
        Self {
            ready_at: Duration::ZERO,
        }
    }

    pub fn ready_at(&self) -> Duration {
        self.ready_at
    }

    pub fn is_ready(&self, now: Duration) -> bool {
        now >= self.ready_at
    }

    /// Remaining time until ready, zero if already ready.
    pub fn time_to_ready(&self, now: Duration) -> Duration {
        self.ready_at.saturating_sub(now)
    }

    pub fn set_ready_at(&mut self, ready_at: Duration) {
        self.ready_at = ready_at;
    }

    /// Start the timer: ready again at `now + duration`.
    pub fn use_for(&mut self, now: Duration, duration: Duration) {
        self.ready_at = now + duration;
    }

    pub fn reset(&mut self) {
        self.ready_at = Duration::ZERO;
    }
}

/// A timer paired with the duration it is started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    pub timer: TimerId,
    pub duration: Duration,
}

impl Cooldown {
    pub fn new(timer: TimerId, duration: Duration) -> Self {
        Self { timer, duration }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TimerSlot {
    pub(crate) owner: UnitId,
    pub(crate) timer: Timer,
}

impl Simulation {
    /// Create a new timer owned by `unit`.
    pub fn new_timer(&mut self, unit: UnitId) -> TimerId {
        let id = TimerId(self.timers.len());
        self.timers.push(TimerSlot {
            owner: unit,
            timer: Timer::new(),
        });
        self.units[unit.0].timers.push(id);
        id
    }

    pub fn timer(&self, id: TimerId) -> &Timer {
        &self.timers[id.0].timer
    }

    pub fn timer_owner(&self, id: TimerId) -> UnitId {
        self.timers[id.0].owner
    }

    pub fn is_timer_ready(&self, id: TimerId) -> bool {
        self.timers[id.0].timer.is_ready(self.now())
    }

    pub fn time_to_ready(&self, id: TimerId) -> Duration {
        self.timers[id.0].timer.time_to_ready(self.now())
    }

    pub fn set_timer_ready_at(&mut self, id: TimerId, ready_at: Duration) {
        self.timers[id.0].timer.set_ready_at(ready_at);
    }

    /// Whether the cooldown's timer is ready now.
    pub fn is_cooldown_ready(&self, cooldown: &Cooldown) -> bool {
        self.is_timer_ready(cooldown.timer)
    }

    /// Start a cooldown from the current time.
    pub fn use_cooldown(&mut self, cooldown: &Cooldown) {
        let now = self.now();
        self.timers[cooldown.timer.0]
            .timer
            .use_for(now, cooldown.duration);
    }

    pub(crate) fn reset_timers(&mut self) {
        for slot in &mut self.timers {
            slot.timer.reset();
        }
    }
}
