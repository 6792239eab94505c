//! Time sources for staleness checks
//!
//! Freshness is judged against a monotonic clock whenever possible, since the
//! wall clock can jump (NTP, time zone changes, user edits).

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

use crate::error::{NavError, Result};

/// Source of "now" for freshness decisions
pub trait Clock: Send + Sync {
    /// Monotonic time in nanoseconds since an arbitrary fixed origin
    fn elapsed_nanos(&self) -> u64;

    /// Wall-clock time in milliseconds since the Unix epoch
    fn wall_millis(&self) -> i64;
}

/// Clock backed by `Instant` (monotonic) and `chrono::Utc` (wall clock)
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed_nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn wall_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually driven clock, used for replays and tests
///
/// Clones share the same time, so a test can keep a handle while the
/// navigator owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    elapsed_nanos: Arc<AtomicU64>,
    wall_millis: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(elapsed_nanos: u64, wall_millis: i64) -> Self {
        Self {
            elapsed_nanos: Arc::new(AtomicU64::new(elapsed_nanos)),
            wall_millis: Arc::new(AtomicI64::new(wall_millis)),
        }
    }

    pub fn set(&self, elapsed_nanos: u64, wall_millis: i64) {
        self.elapsed_nanos.store(elapsed_nanos, Ordering::SeqCst);
        self.wall_millis.store(wall_millis, Ordering::SeqCst);
    }

    /// Move the monotonic clock forward to `elapsed_nanos`; never moves back
    pub fn advance_elapsed_to(&self, elapsed_nanos: u64) {
        self.elapsed_nanos.fetch_max(elapsed_nanos, Ordering::SeqCst);
    }

    /// Move the wall clock forward to `wall_millis`; never moves back
    pub fn advance_wall_to(&self, wall_millis: i64) {
        self.wall_millis.fetch_max(wall_millis, Ordering::SeqCst);
    }

    /// Move both clocks forward by the same amount
    pub fn advance_millis(&self, millis: u64) {
        self.elapsed_nanos
            .fetch_add(millis * crate::constants::MILLI_IN_NANOS, Ordering::SeqCst);
        self.wall_millis.fetch_add(millis as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn elapsed_nanos(&self) -> u64 {
        self.elapsed_nanos.load(Ordering::SeqCst)
    }

    fn wall_millis(&self) -> i64 {
        self.wall_millis.load(Ordering::SeqCst)
    }
}

/// Check whether `previous` lies no more than `validity` before `current`.
///
/// A `previous` timestamp later than `current` is not recent.
///
/// # Errors
/// `NavError::InvalidArgument` if `validity` is zero.
pub fn is_timestamp_recent(current: u64, previous: u64, validity: u64) -> Result<bool> {
    if validity == 0 {
        return Err(NavError::InvalidArgument(
            "validity should be a non-zero positive value".to_string(),
        ));
    }

    Ok(current >= previous && current - previous <= validity)
}
