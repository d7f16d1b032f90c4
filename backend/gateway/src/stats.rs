//! Request statistics.
//!
//! Pipeline bodies are already serialized by the gate, but `record` takes its
//! own lock so the collector stays correct if that ever changes.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Default, Clone)]
struct Counters {
    total: u64,
    succeeded: u64,
    failed: u64,
    busy_rejections: u64,
    success_time: Duration,
}

pub struct StatsCollector {
    counters: Mutex<Counters>,
    started_at: DateTime<Utc>,
    started: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub busy_rejections: u64,
    pub total_processing_seconds: f64,
    pub average_processing_seconds: f64,
    /// Fraction of admitted requests that succeeded, in `[0, 1]`.
    pub success_rate: f64,
    pub uptime_seconds: u64,
    pub started_at: DateTime<Utc>,
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Counts one admitted request. Only successful durations are summed.
    pub fn record(&self, success: bool, duration: Duration) {
        let mut c = self.counters.lock();
        c.total += 1;
        if success {
            c.succeeded += 1;
            c.success_time += duration;
        } else {
            c.failed += 1;
        }
    }

    pub fn record_busy(&self) {
        self.counters.lock().busy_rejections += 1;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let c = self.counters.lock().clone();
        let total_secs = c.success_time.as_secs_f64();
        StatsSnapshot {
            total_requests: c.total,
            successful_requests: c.succeeded,
            failed_requests: c.failed,
            busy_rejections: c.busy_rejections,
            total_processing_seconds: total_secs,
            average_processing_seconds: if c.succeeded == 0 {
                0.0
            } else {
                total_secs / c.succeeded as f64
            },
            success_rate: if c.total == 0 {
                0.0
            } else {
                c.succeeded as f64 / c.total as f64
            },
            uptime_seconds: self.started.elapsed().as_secs(),
            started_at: self.started_at,
        }
    }

    /// Zeroes the counters; the process start time is kept.
    pub fn reset(&self) {
        *self.counters.lock() = Counters::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_derives_rates() {
        let stats = StatsCollector::new();
        stats.record(true, Duration::from_millis(400));
        stats.record(true, Duration::from_millis(600));
        stats.record(false, Duration::from_secs(30));
        stats.record_busy();

        let snap = stats.snapshot();
        assert_eq!(snap.total_requests, 3);
        assert_eq!(snap.successful_requests, 2);
        assert_eq!(snap.failed_requests, 1);
        assert_eq!(snap.busy_rejections, 1);
        assert!((snap.total_processing_seconds - 1.0).abs() < 1e-9);
        assert!((snap.average_processing_seconds - 0.5).abs() < 1e-9);
        assert!((snap.success_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn snapshot_does_not_mutate() {
        let stats = StatsCollector::new();
        stats.record(true, Duration::from_secs(1));
        let a = stats.snapshot();
        let b = stats.snapshot();
        assert_eq!(a.total_requests, b.total_requests);
        assert_eq!(a.total_processing_seconds, b.total_processing_seconds);
    }

    #[test]
    fn empty_collector_has_zero_rates() {
        let snap = StatsCollector::new().snapshot();
        assert_eq!(snap.success_rate, 0.0);
        assert_eq!(snap.average_processing_seconds, 0.0);
    }

    #[test]
    fn reset_keeps_start_time() {
        let stats = StatsCollector::new();
        let started = stats.snapshot().started_at;
        stats.record(true, Duration::from_secs(1));
        stats.reset();
        let snap = stats.snapshot();
        assert_eq!(snap.total_requests, 0);
        assert_eq!(snap.started_at, started);
    }
}
