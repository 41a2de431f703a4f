use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Controllable time for idle-eviction testing.
///
/// Passed to `Workspace::with_time_provider()` so memory activity, project
/// timestamps and versions all follow the scenario's clock.
#[derive(Clone)]
pub struct MockClock {
    current: Arc<AtomicI64>,
}

impl MockClock {
    /// Fixed start so timestamps in failures are reproducible.
    pub const START: i64 = 1_700_000_000;

    pub fn new() -> Self {
        Self {
            current: Arc::new(AtomicI64::new(Self::START)),
        }
    }

    /// Time provider closure sharing this clock.
    pub fn as_provider(&self) -> impl Fn() -> i64 + Send + Sync + 'static {
        let current = self.current.clone();
        move || current.load(Ordering::SeqCst)
    }

    pub fn now(&self) -> i64 {
        self.current.load(Ordering::SeqCst)
    }

    pub fn advance(&self, duration: Duration) {
        self.current
            .fetch_add(duration.as_secs() as i64, Ordering::SeqCst);
    }

    pub fn advance_hours(&self, hours: u64) {
        self.advance(Duration::from_secs(hours * 3600));
    }

    pub fn advance_days(&self, days: u64) {
        self.advance(Duration::from_secs(days * 86400));
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}
