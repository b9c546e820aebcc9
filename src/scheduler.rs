//! Timer primitives used for delayed release and the wait-for-availability loop

use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::runtime::Handle;

/// Work deferred with [`Scheduler::after`]
pub type Continuation = Box<dyn FnOnce() + Send + 'static>;

/// Stand-in distance for deadlines the clock cannot represent, roughly 30 years
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + delay`, saturating to a far-future deadline instead of overflowing
pub(crate) fn deadline_after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Cooperative scheduler the pool runs on.
///
/// `now` must be monotonic. Continuations passed to `after` run once, on the
/// same logical thread of control as the pool operations.
#[async_trait]
pub trait Scheduler: Send + Sync + 'static {
    fn now(&self) -> Instant;

    fn after(&self, delay: Duration, continuation: Continuation);

    /// The instant `delay` from now. Delays too large for the clock give a
    /// deadline decades away.
    fn deadline(&self, delay: Duration) -> Instant {
        deadline_after(self.now(), delay)
    }

    /// Suspend the caller until the next scheduling tick
    async fn wait_next_tick(&self);
}

/// Scheduler backed by the tokio timer.
///
/// Uses tokio's clock, so a runtime with paused time drives it too.
pub struct TokioScheduler {
    handle: Handle,
    tick: Duration,
}

impl TokioScheduler {
    /// Default interval between wait-loop polls
    pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

    /// Create a scheduler on the current tokio runtime
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn new() -> Self {
        Self::with_handle(Handle::current())
    }

    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            tick: Self::DEFAULT_TICK,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }
}

#[async_trait]
impl Scheduler for TokioScheduler {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn after(&self, delay: Duration, continuation: Continuation) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            continuation();
        });
    }

    async fn wait_next_tick(&self) {
        tokio::time::sleep(self.tick).await;
    }
}

struct Pending {
    due: Instant,
    sequence: u64,
    continuation: Continuation,
}

struct ManualClock {
    now: Instant,
    next_sequence: u64,
    pending: Vec<Pending>,
}

/// Virtual-clock scheduler that only moves when told to.
///
/// Continuations run inside [`advance`](ManualScheduler::advance), in due
/// order, with the clock set to their due time. Each
/// [`wait_next_tick`](Scheduler::wait_next_tick) advances the clock by one
/// tick.
///
/// # Examples
///
/// ```
/// use esox_leasepool::{ManualScheduler, Scheduler};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::time::Duration;
///
/// let scheduler = ManualScheduler::new();
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&fired);
/// scheduler.after(Duration::from_secs(2), Box::new(move || flag.store(true, Ordering::SeqCst)));
///
/// scheduler.advance(Duration::from_secs(1));
/// assert!(!fired.load(Ordering::SeqCst));
/// scheduler.advance(Duration::from_secs(1));
/// assert!(fired.load(Ordering::SeqCst));
/// ```
pub struct ManualScheduler {
    clock: Mutex<ManualClock>,
    tick: Duration,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            clock: Mutex::new(ManualClock {
                now: Instant::now(),
                next_sequence: 0,
                pending: Vec::new(),
            }),
            tick: Duration::from_millis(16),
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Move the clock forward, running every continuation that falls due
    pub fn advance(&self, by: Duration) {
        let target = deadline_after(self.clock.lock().now, by);

        loop {
            // The lock is released before running so continuations can
            // schedule further work.
            let next = {
                let mut clock = self.clock.lock();
                let due_index = clock
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, pending)| pending.due <= target)
                    .min_by_key(|(_, pending)| (pending.due, pending.sequence))
                    .map(|(index, _)| index);

                due_index.map(|index| {
                    let pending = clock.pending.swap_remove(index);
                    clock.now = clock.now.max(pending.due);
                    pending.continuation
                })
            };

            match next {
                Some(continuation) => continuation(),
                None => break,
            }
        }

        let mut clock = self.clock.lock();
        clock.now = clock.now.max(target);
    }

    /// Number of continuations that have not run yet
    pub fn pending_count(&self) -> usize {
        self.clock.lock().pending.len()
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scheduler for ManualScheduler {
    fn now(&self) -> Instant {
        self.clock.lock().now
    }

    fn after(&self, delay: Duration, continuation: Continuation) {
        let mut clock = self.clock.lock();
        let due = deadline_after(clock.now, delay);
        let sequence = clock.next_sequence;
        clock.next_sequence += 1;
        clock.pending.push(Pending {
            due,
            sequence,
            continuation,
        });
    }

    async fn wait_next_tick(&self) {
        self.advance(self.tick);
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Continuation) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |label: &'static str| -> Continuation {
            let sink = Arc::clone(&sink);
            Box::new(move || sink.lock().push(label))
        };
        (log, make)
    }

    #[test]
    fn manual_runs_continuations_in_due_order() {
        let scheduler = ManualScheduler::new();
        let (log, make) = recorder();

        scheduler.after(Duration::from_secs(5), make("late"));
        scheduler.after(Duration::from_secs(1), make("early"));
        scheduler.after(Duration::from_secs(1), make("early-second"));

        scheduler.advance(Duration::from_secs(10));
        assert_eq!(*log.lock(), ["early", "early-second", "late"]);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn manual_clock_reads_due_time_inside_continuation() {
        let scheduler = Arc::new(ManualScheduler::new());
        let start = scheduler.now();
        let seen = Arc::new(Mutex::new(None));

        let observer = Arc::clone(&scheduler);
        let slot = Arc::clone(&seen);
        scheduler.after(
            Duration::from_secs(3),
            Box::new(move || *slot.lock() = Some(observer.now())),
        );

        scheduler.advance(Duration::from_secs(7));
        assert_eq!(*seen.lock(), Some(start + Duration::from_secs(3)));
        assert_eq!(scheduler.now(), start + Duration::from_secs(7));
    }

    #[test]
    fn manual_continuation_may_schedule_more_work() {
        let scheduler = Arc::new(ManualScheduler::new());
        let (log, make) = recorder();

        let inner = Arc::clone(&scheduler);
        let second = make("second");
        let first = make("first");
        scheduler.after(
            Duration::from_secs(1),
            Box::new(move || {
                first();
                inner.after(Duration::from_secs(1), second);
            }),
        );

        scheduler.advance(Duration::from_secs(1));
        assert_eq!(*log.lock(), ["first"]);
        scheduler.advance(Duration::from_secs(1));
        assert_eq!(*log.lock(), ["first", "second"]);
    }

    #[test]
    fn oversized_delays_saturate_to_a_far_deadline() {
        let scheduler = ManualScheduler::new();
        let start = scheduler.now();
        let (log, make) = recorder();

        let deadline = scheduler.deadline(Duration::MAX);
        assert!(deadline > start + Duration::from_secs(86_400 * 365));

        scheduler.after(Duration::MAX, make("never"));
        scheduler.advance(Duration::from_secs(86_400 * 365));

        assert!(log.lock().is_empty());
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[tokio::test]
    async fn manual_wait_next_tick_advances_one_tick() {
        let scheduler = ManualScheduler::new().with_tick(Duration::from_millis(20));
        let start = scheduler.now();

        scheduler.wait_next_tick().await;
        scheduler.wait_next_tick().await;

        assert_eq!(scheduler.now(), start + Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_after_fires_once_delay_elapses() {
        let scheduler = TokioScheduler::new();
        let (log, make) = recorder();

        scheduler.after(Duration::from_secs(2), make("fired"));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(log.lock().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(*log.lock(), ["fired"]);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_now_follows_paused_clock() {
        let scheduler = TokioScheduler::new().with_tick(Duration::from_millis(50));
        let start = scheduler.now();

        scheduler.wait_next_tick().await;

        assert!(scheduler.now() - start >= Duration::from_millis(50));
    }
}
