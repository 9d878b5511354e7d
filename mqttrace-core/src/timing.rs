//! ## mqttrace-core::timing
//! **Wall-clock timing windows with fixed-point durations**
//!
//! Timestamps are integer microseconds since the Unix epoch. Durations are
//! derived by exact decimal subtraction and truncated to four fractional
//! digits, so the reported value never depends on float rounding.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use mqttrace_telemetry::FixedDecimal;

/// Fractional digits of the reported timestamps.
pub const TIMESTAMP_SCALE: u32 = 6;
/// Fractional digits of the reported duration.
pub const DURATION_SCALE: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    micros: u64,
}

impl Timestamp {
    pub const fn from_micros(micros: u64) -> Self {
        Self { micros }
    }

    #[inline]
    pub fn as_micros(&self) -> u64 {
        self.micros
    }

    /// Seconds since the epoch with microsecond digits.
    pub fn as_decimal(&self) -> FixedDecimal {
        FixedDecimal::new(self.micros as i64, TIMESTAMP_SCALE)
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// System wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_micros() as u64)
            .unwrap_or_default();
        Timestamp::from_micros(micros)
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            micros: Arc::new(AtomicU64::new(start.as_micros())),
        }
    }

    #[inline]
    pub fn advance(&self, micros: u64) {
        self.micros.fetch_add(micros, Ordering::Release);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> Timestamp {
        Timestamp::from_micros(self.micros.load(Ordering::Acquire))
    }
}

/// Start and end instants bracketing one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingWindow {
    start: Timestamp,
    end: Timestamp,
}

impl TimingWindow {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    /// `end - start` at [`DURATION_SCALE`], truncated toward zero.
    pub fn duration(&self) -> FixedDecimal {
        self.end
            .as_decimal()
            .checked_sub(self.start.as_decimal())
            .map(|elapsed| elapsed.rescale(DURATION_SCALE))
            .unwrap_or(FixedDecimal::zero(DURATION_SCALE))
    }
}

/// Runs `operation` between two clock readings. The window is closed whether
/// the operation succeeds or not; its result is returned unchanged.
pub fn measure<T, E>(
    clock: &dyn Clock,
    operation: impl FnOnce() -> Result<T, E>,
) -> (Result<T, E>, TimingWindow) {
    let start = clock.now();
    let outcome = operation();
    let end = clock.now();
    (outcome, TimingWindow::new(start, end))
}
