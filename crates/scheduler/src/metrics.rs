use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct Counters {
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    in_flight: AtomicU64,
    peak_in_flight: AtomicU64,
}

static COUNTERS: Lazy<Counters> = Lazy::new(Counters::default);

fn increment(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

pub fn record_completed() {
    increment(&COUNTERS.completed);
}

pub fn record_failed() {
    increment(&COUNTERS.failed);
}

pub fn record_skipped() {
    increment(&COUNTERS.skipped);
}

/// Marks a target as running until the guard drops.
pub fn track_in_flight() -> InFlightGuard {
    increment(&COUNTERS.started);
    let now = COUNTERS.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    COUNTERS.peak_in_flight.fetch_max(now, Ordering::SeqCst);
    InFlightGuard { _private: () }
}

pub struct InFlightGuard {
    _private: (),
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        COUNTERS.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Debug, Default)]
pub struct SchedulerMetricsSnapshot {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub in_flight: u64,
    pub peak_in_flight: u64,
}

pub fn snapshot() -> SchedulerMetricsSnapshot {
    SchedulerMetricsSnapshot {
        started: COUNTERS.started.load(Ordering::Relaxed),
        completed: COUNTERS.completed.load(Ordering::Relaxed),
        failed: COUNTERS.failed.load(Ordering::Relaxed),
        skipped: COUNTERS.skipped.load(Ordering::Relaxed),
        in_flight: COUNTERS.in_flight.load(Ordering::SeqCst),
        peak_in_flight: COUNTERS.peak_in_flight.load(Ordering::SeqCst),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_raises_peak_and_releases() {
        let before = snapshot();
        {
            let _a = track_in_flight();
            let _b = track_in_flight();
            assert!(snapshot().peak_in_flight >= 2);
        }
        assert!(snapshot().started >= before.started + 2);
    }
}
