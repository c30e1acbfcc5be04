//! Time sources
//!
//! All timestamps in LiveScope are milliseconds as `f64`. The store never
//! reads the wall clock itself; pause and resume instants come from a
//! [`Clock`] owned by the query facade so tests can drive time explicitly.

use std::sync::atomic::{AtomicU64, Ordering};

/// Milliseconds since an arbitrary epoch (the Unix epoch for [`SystemClock`])
pub type Millis = f64;

/// Source of "now" for pause/resume boundaries
pub trait Clock: Send + Sync {
    /// Current time in milliseconds
    fn now(&self) -> Millis;
}

/// Wall clock backed by `chrono::Utc`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Millis {
        chrono::Utc::now().timestamp_micros() as f64 / 1000.0
    }
}

/// Manually driven clock
///
/// The time is stored as the bit pattern of an `f64` so it can be shared
/// between the ingestion task and test code without a lock.
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    /// Create a clock starting at `start`
    pub fn new(start: Millis) -> Self {
        Self {
            bits: AtomicU64::new(start.to_bits()),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, time: Millis) {
        self.bits.store(time.to_bits(), Ordering::SeqCst);
    }

    /// Move the clock forward by `delta` milliseconds
    pub fn advance(&self, delta: Millis) {
        let _ = self
            .bits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |bits| {
                Some((f64::from_bits(bits) + delta).to_bits())
            });
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Millis {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}
