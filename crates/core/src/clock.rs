use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Where the clock reads host milliseconds from.
///
/// The engine never consults a global clock; everything flows through this
/// seam so tests (and headless drivers) can step time by hand.
pub trait TimeSource {
    /// Milliseconds since an arbitrary fixed origin. Must be monotonic
    /// non-decreasing.
    fn now_ms(&self) -> f64;
}

/// Production source backed by `std::time::Instant`.
pub struct MonotonicSource {
    origin: Instant,
}

impl MonotonicSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicSource {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Manually stepped source for tests and simulations.
pub struct ManualSource {
    now: Cell<f64>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self { now: Cell::new(0.0) }
    }

    pub fn advance_ms(&self, delta: f64) {
        self.now.set(self.now.get() + delta);
    }

    pub fn set_ms(&self, ms: f64) {
        self.now.set(ms);
    }
}

impl Default for ManualSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualSource {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

struct Pending<T> {
    due_ms: f64,
    token: T,
}

/// Pausable, resettable monotonic clock with a deferred-token queue.
///
/// `now_ms()` counts elapsed unpaused milliseconds and is frozen while
/// paused. Tokens registered with [`Clock::after`] come back out of
/// [`Clock::tick`] once their due time has passed, in registration order
/// for ties. `reset()` restarts elapsed time at zero and discards every
/// pending token, so removals scheduled against the previous epoch can
/// never fire against new content after a seek.
pub struct Clock<T> {
    source: Rc<dyn TimeSource>,
    start: f64,
    paused: bool,
    pause_time: f64,
    pending: Vec<Pending<T>>,
}

impl<T> Clock<T> {
    /// A fresh clock starts paused at zero; callers resume it when playback
    /// actually runs.
    pub fn new(source: Rc<dyn TimeSource>) -> Self {
        let start = source.now_ms();
        Self {
            source,
            start,
            paused: true,
            pause_time: start,
            pending: Vec::new(),
        }
    }

    /// Elapsed unpaused milliseconds.
    pub fn now_ms(&self) -> f64 {
        if self.paused {
            self.pause_time - self.start
        } else {
            self.source.now_ms() - self.start
        }
    }

    pub fn now_seconds(&self) -> f64 {
        self.now_ms() / 1000.0
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Freeze `now()`. Idempotent.
    pub fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        self.pause_time = self.source.now_ms();
    }

    /// Unfreeze `now()`. Idempotent.
    pub fn resume(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        self.start += self.source.now_ms() - self.pause_time;
    }

    /// Restart elapsed time at zero and drop all pending tokens.
    pub fn reset(&mut self) {
        self.start = self.source.now_ms();
        self.pause_time = self.start;
        self.pending.clear();
    }

    /// Schedule `token` to come due after `delay_ms`.
    ///
    /// A degenerate delay (`NaN`, negative or infinite) hands the token
    /// straight back instead of rejecting it; the caller fires it
    /// synchronously.
    #[must_use]
    pub fn after(&mut self, delay_ms: f64, token: T) -> Option<T> {
        if !delay_ms.is_finite() || delay_ms < 0.0 {
            return Some(token);
        }
        self.pending.push(Pending {
            due_ms: self.now_ms() + delay_ms,
            token,
        });
        None
    }

    /// Collect every token whose due time has passed, in registration order.
    /// A no-op while paused.
    pub fn tick(&mut self) -> Vec<T> {
        if self.paused {
            return Vec::new();
        }
        let now = self.now_ms();
        let mut due = Vec::new();
        let mut remaining = Vec::with_capacity(self.pending.len());
        for entry in self.pending.drain(..) {
            if entry.due_ms <= now {
                due.push(entry.token);
            } else {
                remaining.push(entry);
            }
        }
        self.pending = remaining;
        due
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
