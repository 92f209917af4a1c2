use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct Counters {
    runs: AtomicU64,
    iterations: AtomicU64,
    stops: AtomicU64,
    exhaustions: AtomicU64,
    interrupts: AtomicU64,
    handler_errors: AtomicU64,
}

static COUNTERS: Lazy<Counters> = Lazy::new(Counters::default);

fn increment(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

pub fn record_run() {
    increment(&COUNTERS.runs);
}

pub fn record_iteration() {
    increment(&COUNTERS.iterations);
}

pub fn record_stop() {
    increment(&COUNTERS.stops);
}

pub fn record_exhausted() {
    increment(&COUNTERS.exhaustions);
}

pub fn record_interrupt() {
    increment(&COUNTERS.interrupts);
}

pub fn record_handler_error() {
    increment(&COUNTERS.handler_errors);
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SchedulerMetricsSnapshot {
    pub runs: u64,
    pub iterations: u64,
    pub stops: u64,
    pub exhaustions: u64,
    pub interrupts: u64,
    pub handler_errors: u64,
}

pub fn snapshot() -> SchedulerMetricsSnapshot {
    SchedulerMetricsSnapshot {
        runs: COUNTERS.runs.load(Ordering::Relaxed),
        iterations: COUNTERS.iterations.load(Ordering::Relaxed),
        stops: COUNTERS.stops.load(Ordering::Relaxed),
        exhaustions: COUNTERS.exhaustions.load(Ordering::Relaxed),
        interrupts: COUNTERS.interrupts.load(Ordering::Relaxed),
        handler_errors: COUNTERS.handler_errors.load(Ordering::Relaxed),
    }
}
