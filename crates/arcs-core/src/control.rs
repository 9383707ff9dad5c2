//! Cooperative cancellation and wall-clock budgets for long running phases.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared flag checked by the optimizer once per generation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the non-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Visible to every clone of the token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Monotonic time source.
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// [`Clock`] backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Starts a clock at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Deterministic clock that advances by a fixed step on every reading.
#[derive(Debug)]
pub struct SteppingClock {
    step_nanos: u64,
    ticks: AtomicU64,
}

impl SteppingClock {
    /// Creates a clock advancing `step` per call to [`Clock::now`].
    pub fn new(step: Duration) -> Self {
        Self {
            step_nanos: step.as_nanos().min(u128::from(u64::MAX)) as u64,
            ticks: AtomicU64::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> Duration {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        Duration::from_nanos(tick.saturating_mul(self.step_nanos))
    }
}

/// Wall-clock allowance measured against a [`Clock`].
pub struct RunBudget {
    clock: Arc<dyn Clock>,
    started: Duration,
    limit: Duration,
}

impl RunBudget {
    /// Starts a budget of `limit` on the provided clock.
    pub fn start(clock: Arc<dyn Clock>, limit: Duration) -> Self {
        let started = clock.now();
        Self {
            clock,
            started,
            limit,
        }
    }

    /// Starts a budget on a fresh [`MonotonicClock`].
    pub fn wall(limit: Duration) -> Self {
        Self::start(Arc::new(MonotonicClock::new()), limit)
    }

    /// Time spent since the budget started.
    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.started)
    }

    /// Whether the allowance is used up.
    pub fn expired(&self) -> bool {
        self.elapsed() >= self.limit
    }

    /// Configured allowance.
    pub fn limit(&self) -> Duration {
        self.limit
    }
}

impl std::fmt::Debug for RunBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunBudget")
            .field("started", &self.started)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn stepping_clock_expires_budget() {
        let clock = Arc::new(SteppingClock::new(Duration::from_millis(10)));
        let budget = RunBudget::start(clock, Duration::from_millis(25));
        assert!(!budget.expired());
        assert!(!budget.expired());
        assert!(budget.expired());
    }
}
