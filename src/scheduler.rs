//! The event scheduler.
//!
//! Pending work is kept in a min-heap ordered by `(time, sequence)`, so two
//! actions due at the same instant run in the order they were scheduled.
//! Cancelling removes the payload; the heap entry stays behind and is
//! skipped when popped.

use crate::aura::AuraId;
use crate::dot::DotId;
use crate::simulation::Simulation;
use crate::unit::{Hand, UnitId};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Content-supplied one-shot work.
pub type CustomAction = Box<dyn FnOnce(&mut Simulation) + Send>;

/// Content-supplied repeating work; receives the 1-based tick number.
pub type PeriodicAction = Arc<dyn Fn(&mut Simulation, u32) + Send + Sync>;

/// A unit of work the scheduler can run.
pub enum Action {
    AuraExpire(AuraId),
    DotTick(DotId),
    CastComplete(UnitId),
    UnitReady(UnitId),
    AutoAttack { unit: UnitId, hand: Hand },
    PetTimeout(UnitId),
    Periodic(PeriodicId),
    EndTrial,
    Custom(CustomAction),
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::AuraExpire(id) => write!(f, "AuraExpire({:?})", id),
            Action::DotTick(id) => write!(f, "DotTick({:?})", id),
            Action::CastComplete(id) => write!(f, "CastComplete({:?})", id),
            Action::UnitReady(id) => write!(f, "UnitReady({:?})", id),
            Action::AutoAttack { unit, hand } => write!(f, "AutoAttack({:?}, {:?})", unit, hand),
            Action::PetTimeout(id) => write!(f, "PetTimeout({:?})", id),
            Action::Periodic(id) => write!(f, "Periodic({:?})", id),
            Action::EndTrial => f.write_str("EndTrial"),
            Action::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Handle to a scheduled one-shot action.
///
/// Sequence numbers are never reused, so a stale handle can never cancel
/// somebody else's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionHandle(u64);

/// Handle to a periodic task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodicId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueEntry {
    at: Duration,
    seq: u64,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at).then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Time-ordered queue of pending actions.
#[derive(Default)]
pub struct Scheduler {
    now: Duration,
    next_seq: u64,
    queue: BinaryHeap<Reverse<QueueEntry>>,
    pending: HashMap<u64, Action>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulated time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Queue `action` to run at `at`.
    ///
    /// # Panics
    ///
    /// Panics if `at` is earlier than the current time. Scheduling into the
    /// past is a causality violation and aborts the trial.
    pub fn schedule_at(&mut self, at: Duration, action: Action) -> ActionHandle {
        assert!(
            at >= self.now,
            "causality violation: {:?} scheduled at {:?} but the clock is already at {:?}",
            action,
            at,
            self.now
        );
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(QueueEntry { at, seq }));
        self.pending.insert(seq, action);
        ActionHandle(seq)
    }

    /// Cancel a pending action. Returns false if it already ran or was cancelled.
    pub fn cancel(&mut self, handle: ActionHandle) -> bool {
        self.pending.remove(&handle.0).is_some()
    }

    pub fn is_pending(&self, handle: ActionHandle) -> bool {
        self.pending.contains_key(&handle.0)
    }

    /// Number of live (not cancelled) actions.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Time of the next live action, discarding cancelled heap entries.
    pub fn peek_time(&mut self) -> Option<Duration> {
        while let Some(Reverse(entry)) = self.queue.peek() {
            if self.pending.contains_key(&entry.seq) {
                return Some(entry.at);
            }
            self.queue.pop();
        }
        None
    }

    /// Pop the next live action due no later than `until`, advancing the clock.
    pub fn pop_due(&mut self, until: Duration) -> Option<(Duration, Action)> {
        loop {
            let entry = match self.queue.peek() {
                Some(Reverse(entry)) if entry.at <= until => *entry,
                _ => return None,
            };
            self.queue.pop();
            if let Some(action) = self.pending.remove(&entry.seq) {
                self.now = entry.at;
                return Some((entry.at, action));
            }
        }
    }

    /// Move the clock forward without running anything.
    pub(crate) fn advance_clock(&mut self, to: Duration) {
        if to > self.now {
            self.now = to;
        }
    }

    /// Drop all pending work and rewind the clock to zero.
    pub fn reset(&mut self) {
        self.now = Duration::ZERO;
        self.queue.clear();
        self.pending.clear();
    }
}

pub(crate) struct PeriodicTask {
    period: Duration,
    remaining: Option<u32>,
    tick: u32,
    action: PeriodicAction,
    handle: Option<ActionHandle>,
}

/// Options for [`Simulation::schedule_periodic`].
#[derive(Clone)]
pub struct PeriodicOptions {
    /// Time of the first tick.
    pub start: Duration,
    pub period: Duration,
    /// Number of ticks, `None` for "until cancelled or the trial ends".
    pub tick_count: Option<u32>,
    pub action: PeriodicAction,
}

impl Simulation {
    /// Current simulated time.
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// Run `action` at `at`.
    ///
    /// # Panics
    ///
    /// Panics if `at` is in the past.
    pub fn schedule_at<F>(&mut self, at: Duration, action: F) -> ActionHandle
    where
        F: FnOnce(&mut Simulation) + Send + 'static,
    {
        self.scheduler.schedule_at(at, Action::Custom(Box::new(action)))
    }

    /// Run `action` after `delay`.
    pub fn schedule_in<F>(&mut self, delay: Duration, action: F) -> ActionHandle
    where
        F: FnOnce(&mut Simulation) + Send + 'static,
    {
        let at = self.now() + delay;
        self.schedule_at(at, action)
    }

    /// Cancel a one-shot action.
    pub fn cancel(&mut self, handle: ActionHandle) -> bool {
        self.scheduler.cancel(handle)
    }

    pub fn is_pending(&self, handle: ActionHandle) -> bool {
        self.scheduler.is_pending(handle)
    }

    /// Repeat an action every `period`, starting at `start`.
    ///
    /// A `tick_count` of zero schedules nothing.
    ///
    /// # Panics
    ///
    /// Panics if `start` is in the past or `period` is zero for an unbounded task.
    pub fn schedule_periodic(&mut self, options: PeriodicOptions) -> PeriodicId {
        assert!(
            !(options.period.is_zero() && options.tick_count.is_none()),
            "unbounded periodic task with a zero period would never let time advance"
        );
        let id = PeriodicId(self.next_periodic_id);
        self.next_periodic_id += 1;

        let handle = if options.tick_count == Some(0) {
            None
        } else {
            Some(
                self.scheduler
                    .schedule_at(options.start, Action::Periodic(id)),
            )
        };
        self.periodic.insert(
            id.0,
            PeriodicTask {
                period: options.period,
                remaining: options.tick_count,
                tick: 0,
                action: options.action,
                handle,
            },
        );
        id
    }

    /// Stop a periodic task; remaining ticks never run.
    pub fn cancel_periodic(&mut self, id: PeriodicId) -> bool {
        match self.periodic.remove(&id.0) {
            Some(task) => {
                if let Some(handle) = task.handle {
                    self.scheduler.cancel(handle);
                }
                true
            }
            None => false,
        }
    }

    pub fn is_periodic_active(&self, id: PeriodicId) -> bool {
        self.periodic.contains_key(&id.0)
    }

    pub(crate) fn run_periodic(&mut self, id: PeriodicId) {
        let (action, tick) = match self.periodic.get_mut(&id.0) {
            Some(task) => {
                task.tick += 1;
                task.handle = None;
                if let Some(remaining) = task.remaining.as_mut() {
                    *remaining -= 1;
                }
                (Arc::clone(&task.action), task.tick)
            }
            None => return,
        };

        action(self, tick);

        // The action may have cancelled its own task.
        let now = self.now();
        let next = match self.periodic.get(&id.0) {
            Some(task) if task.remaining != Some(0) => Some(now + task.period),
            Some(_) => {
                self.periodic.remove(&id.0);
                None
            }
            None => None,
        };
        if let Some(at) = next {
            let handle = self.scheduler.schedule_at(at, Action::Periodic(id));
            if let Some(task) = self.periodic.get_mut(&id.0) {
                task.handle = Some(handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(unit: usize) -> Action {
        Action::UnitReady(UnitId(unit))
    }

    fn unit_of(action: Action) -> usize {
        match action {
            Action::UnitReady(UnitId(u)) => u,
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_time_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(Duration::from_secs(3), ready(3));
        scheduler.schedule_at(Duration::from_secs(1), ready(1));
        scheduler.schedule_at(Duration::from_secs(2), ready(2));

        let order: Vec<usize> = std::iter::from_fn(|| scheduler.pop_due(Duration::MAX))
            .map(|(_, a)| unit_of(a))
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(scheduler.now(), Duration::from_secs(3));
    }

    #[test]
    fn test_same_timestamp_is_fifo() {
        let mut scheduler = Scheduler::new();
        let at = Duration::from_millis(1500);
        for unit in 0..10 {
            scheduler.schedule_at(at, ready(unit));
        }
        let order: Vec<usize> = std::iter::from_fn(|| scheduler.pop_due(Duration::MAX))
            .map(|(_, a)| unit_of(a))
            .collect();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_cancelled_actions_are_skipped() {
        let mut scheduler = Scheduler::new();
        let first = scheduler.schedule_at(Duration::from_secs(1), ready(1));
        scheduler.schedule_at(Duration::from_secs(2), ready(2));

        assert!(scheduler.cancel(first));
        assert!(!scheduler.cancel(first));
        assert!(!scheduler.is_pending(first));
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.peek_time(), Some(Duration::from_secs(2)));

        let (at, action) = scheduler.pop_due(Duration::MAX).unwrap();
        assert_eq!(at, Duration::from_secs(2));
        assert_eq!(unit_of(action), 2);
        assert!(scheduler.pop_due(Duration::MAX).is_none());
    }

    #[test]
    fn test_pop_due_respects_limit() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(Duration::from_secs(5), ready(5));
        assert!(scheduler.pop_due(Duration::from_secs(4)).is_none());
        assert_eq!(scheduler.now(), Duration::ZERO);
        assert!(scheduler.pop_due(Duration::from_secs(5)).is_some());
    }

    #[test]
    #[should_panic(expected = "causality violation")]
    fn test_scheduling_in_the_past_panics() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(Duration::from_secs(2), ready(0));
        scheduler.pop_due(Duration::MAX);
        scheduler.schedule_at(Duration::from_secs(1), ready(1));
    }

    #[test]
    fn test_reset_clears_queue() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(Duration::from_secs(1), ready(1));
        scheduler.pop_due(Duration::MAX);
        scheduler.schedule_at(Duration::from_secs(4), ready(4));
        scheduler.reset();
        assert_eq!(scheduler.now(), Duration::ZERO);
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.peek_time(), None);
    }
}
