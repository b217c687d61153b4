#![forbid(unsafe_code)]

//! Host-driven timer scheduler.
//!
//! Time is virtual: it only moves when the host calls [`Scheduler::advance`]
//! (tests, deterministic replays) or pumps a [`WallClock`] from its event
//! loop. Callbacks are fire-and-forget `FnOnce` closures.
//!
//! # Invariants
//!
//! - Callbacks run in `(due, scheduling order)` order.
//! - `now()` is non-decreasing; while a callback runs it equals the
//!   callback's due time.
//! - No scheduler borrow is held while a callback runs, so callbacks may
//!   schedule or clear further timers.
//!
//! # Failure Modes
//!
//! - `clear_timeout` on a fired or unknown timer returns `false`.
//! - `run_until_idle` does not terminate if callbacks keep rescheduling
//!   themselves; hosts with periodic timers should use `advance`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use web_time::Instant;

/// Handle for cancelling a scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

struct Task {
    id: TimerId,
    due: Duration,
    callback: Box<dyn FnOnce()>,
}

#[derive(Default)]
struct SchedulerInner {
    now: Duration,
    next_id: u64,
    tasks: Vec<Task>,
}

impl SchedulerInner {
    /// Remove and return the earliest task due at or before `deadline`.
    fn pop_due(&mut self, deadline: Duration) -> Option<Task> {
        let index = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.due <= deadline)
            .min_by_key(|(_, task)| (task.due, task.id))
            .map(|(index, _)| index)?;
        let task = self.tasks.swap_remove(index);
        self.now = self.now.max(task.due);
        Some(task)
    }
}

/// Shared handle to a virtual-time timer queue.
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Scheduler")
            .field("now", &inner.now)
            .field("pending", &inner.tasks.len())
            .finish()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time since the scheduler was created.
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Number of callbacks waiting to run.
    pub fn pending(&self) -> usize {
        self.inner.borrow().tasks.len()
    }

    /// Due time of the next callback.
    pub fn next_due(&self) -> Option<Duration> {
        self.inner.borrow().tasks.iter().map(|task| task.due).min()
    }

    /// Run `callback` once `delay` has elapsed.
    pub fn set_timeout(&self, delay: Duration, callback: impl FnOnce() + 'static) -> TimerId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = TimerId(inner.next_id);
        let due = inner.now + delay;
        inner.tasks.push(Task {
            id,
            due,
            callback: Box::new(callback),
        });
        id
    }

    /// Drop a pending callback. Returns `false` if it already ran.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.tasks.len();
        inner.tasks.retain(|task| task.id != id);
        inner.tasks.len() != before
    }

    /// Move time forward by `delta`, running every callback that becomes
    /// due. Returns the number of callbacks run.
    pub fn advance(&self, delta: Duration) -> usize {
        let deadline = self.now() + delta;
        let mut ran = 0;
        loop {
            let task = self.inner.borrow_mut().pop_due(deadline);
            match task {
                Some(task) => {
                    (task.callback)();
                    ran += 1;
                }
                None => break,
            }
        }
        let mut inner = self.inner.borrow_mut();
        inner.now = inner.now.max(deadline);
        ran
    }

    /// Run callbacks until the queue is empty, moving time to each due
    /// point. Returns the number of callbacks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while let Some(due) = self.next_due() {
            let delta = due.saturating_sub(self.now());
            ran += self.advance(delta);
        }
        ran
    }
}

/// Bridges real elapsed time into a [`Scheduler`].
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    last: Instant,
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Advance `scheduler` by the time elapsed since the previous pump.
    pub fn pump(&mut self, scheduler: &Scheduler) -> usize {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last);
        self.last = now;
        scheduler.advance(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn callbacks_wait_for_their_delay() {
        let sched = Scheduler::new();
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        sched.set_timeout(MS * 400, move || flag.set(true));

        assert_eq!(sched.advance(MS * 399), 0);
        assert!(!fired.get());
        assert_eq!(sched.advance(MS), 1);
        assert!(fired.get());
        assert_eq!(sched.now(), MS * 400);
    }

    #[test]
    fn same_due_time_runs_in_scheduling_order() {
        let sched = Scheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for n in 0..4 {
            let log = Rc::clone(&order);
            sched.set_timeout(MS * 10, move || log.borrow_mut().push(n));
        }
        sched.advance(MS * 10);
        assert_eq!(&*order.borrow(), &[0, 1, 2, 3]);
    }

    #[test]
    fn earlier_due_runs_first() {
        let sched = Scheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let late = Rc::clone(&order);
        sched.set_timeout(MS * 20, move || late.borrow_mut().push("late"));
        let early = Rc::clone(&order);
        sched.set_timeout(MS * 5, move || early.borrow_mut().push("early"));
        sched.run_until_idle();
        assert_eq!(&*order.borrow(), &["early", "late"]);
    }

    #[test]
    fn callback_sees_its_due_time_and_can_reschedule() {
        let sched = Scheduler::new();
        let seen = Rc::new(Cell::new(Duration::ZERO));
        let inner_sched = sched.clone();
        let slot = Rc::clone(&seen);
        sched.set_timeout(MS * 3, move || {
            let nested = inner_sched.clone();
            let slot = Rc::clone(&slot);
            inner_sched.set_timeout(MS * 2, move || slot.set(nested.now()));
        });
        assert_eq!(sched.advance(MS * 10), 2);
        assert_eq!(seen.get(), MS * 5);
    }

    #[test]
    fn clear_timeout_cancels_pending() {
        let sched = Scheduler::new();
        let id = sched.set_timeout(MS, || panic!("cleared timer ran"));
        assert!(sched.clear_timeout(id));
        assert!(!sched.clear_timeout(id));
        assert_eq!(sched.run_until_idle(), 0);
    }

    #[test]
    fn wall_clock_pump_never_runs_future_timers_early() {
        let sched = Scheduler::new();
        sched.set_timeout(Duration::from_secs(3600), || {});
        let mut clock = WallClock::new();
        assert_eq!(clock.pump(&sched), 0);
        assert_eq!(sched.pending(), 1);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn fires_in_due_order(delays in proptest::collection::vec(0u64..1_000, 1..32)) {
                let sched = Scheduler::new();
                let fired = Rc::new(RefCell::new(Vec::new()));
                for (n, delay) in delays.iter().enumerate() {
                    let log = Rc::clone(&fired);
                    let clock = sched.clone();
                    sched.set_timeout(Duration::from_millis(*delay), move || {
                        log.borrow_mut().push((clock.now(), n));
                    });
                }
                prop_assert_eq!(sched.run_until_idle(), delays.len());
                let fired = fired.borrow();
                for pair in fired.windows(2) {
                    prop_assert!(pair[0] <= pair[1]);
                }
                for (at, n) in fired.iter() {
                    prop_assert_eq!(*at, Duration::from_millis(delays[*n]));
                }
            }
        }
    }
}
