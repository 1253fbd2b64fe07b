// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

use itertools::Itertools;
use std::{
    array,
    fmt,
    ops::Sub,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

/// Latency buckets double from 100ms up to ~25.6s, matching the Prometheus
/// histogram layout in `metrics.rs`.
pub const LATENCY_BUCKET_COUNT: usize = 9;
const LATENCY_BUCKET_START_MS: u64 = 100;

pub fn bucket_upper_bound_ms(index: usize) -> u64 {
    LATENCY_BUCKET_START_MS << index
}

#[derive(Debug)]
pub struct LatencyHistogram {
    buckets: [AtomicU64; LATENCY_BUCKET_COUNT],
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self {
            buckets: array::from_fn(|_| AtomicU64::new(0)),
        }
    }
}

impl LatencyHistogram {
    pub fn record(&self, latency_ms: u64) {
        let index = (0..LATENCY_BUCKET_COUNT)
            .find(|index| latency_ms <= bucket_upper_bound_ms(*index))
            .unwrap_or(LATENCY_BUCKET_COUNT - 1);
        self.buckets[index].fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> [u64; LATENCY_BUCKET_COUNT] {
        array::from_fn(|index| self.buckets[index].load(Ordering::Relaxed))
    }
}

/// Live counters for one operation class, shared across workers.
#[derive(Debug, Default)]
pub struct OpStatsAccumulator {
    pub submitted: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub expired: AtomicU64,
    pub latency_sum_ms: AtomicU64,
    pub latency_samples: AtomicU64,
    pub latencies: LatencyHistogram,
}

impl OpStatsAccumulator {
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, latency: Duration) {
        let latency_ms = latency.as_millis() as u64;
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
        self.latencies.record(latency_ms);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self) {
        self.expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn accumulate(&self) -> OpStats {
        OpStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            latency_sum_ms: self.latency_sum_ms.load(Ordering::Relaxed),
            latency_samples: self.latency_samples.load(Ordering::Relaxed),
            latency_buckets: self.latencies.snapshot(),
        }
    }
}

/// Live counters for a whole emit job. `tasks` tracks the asynchronous
/// completion of accepted inference submissions, not direct HTTP calls.
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    pub inference: OpStatsAccumulator,
    pub verify: OpStatsAccumulator,
    pub aggregate: OpStatsAccumulator,
    pub tasks: OpStatsAccumulator,
}

impl StatsAccumulator {
    pub fn accumulate(&self) -> RequestStats {
        RequestStats {
            inference: self.inference.accumulate(),
            verify: self.verify.accumulate(),
            aggregate: self.aggregate.accumulate(),
            tasks: self.tasks.accumulate(),
        }
    }
}

/// Point-in-time snapshot of one operation class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpStats {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub expired: u64,
    pub latency_sum_ms: u64,
    pub latency_samples: u64,
    pub latency_buckets: [u64; LATENCY_BUCKET_COUNT],
}

impl OpStats {
    pub fn mean_latency_ms(&self) -> u64 {
        if self.latency_samples == 0 {
            0
        } else {
            self.latency_sum_ms / self.latency_samples
        }
    }

    /// Percentile estimate from the bucketed histogram; returns the upper
    /// bound of the bucket the percentile falls in.
    pub fn latency_percentile_ms(&self, percentile: f64) -> u64 {
        let total: u64 = self.latency_buckets.iter().sum();
        if total == 0 {
            return 0;
        }
        let target = (total as f64 * percentile).ceil() as u64;
        let mut seen = 0;
        for (index, count) in self.latency_buckets.iter().enumerate() {
            seen += count;
            if seen >= target {
                return bucket_upper_bound_ms(index);
            }
        }
        bucket_upper_bound_ms(LATENCY_BUCKET_COUNT - 1)
    }

    pub fn rate(&self, window: Duration) -> OpStatsRate {
        let secs = window.as_secs_f64().max(f64::EPSILON);
        OpStatsRate {
            submitted_per_s: self.submitted as f64 / secs,
            succeeded_per_s: self.succeeded as f64 / secs,
            failed_per_s: self.failed as f64 / secs,
            expired_per_s: self.expired as f64 / secs,
            mean_latency_ms: self.mean_latency_ms(),
            p99_latency_ms: self.latency_percentile_ms(0.99),
        }
    }
}

impl Sub for &OpStats {
    type Output = OpStats;

    fn sub(self, other: &OpStats) -> OpStats {
        OpStats {
            submitted: self.submitted.saturating_sub(other.submitted),
            succeeded: self.succeeded.saturating_sub(other.succeeded),
            failed: self.failed.saturating_sub(other.failed),
            expired: self.expired.saturating_sub(other.expired),
            latency_sum_ms: self.latency_sum_ms.saturating_sub(other.latency_sum_ms),
            latency_samples: self.latency_samples.saturating_sub(other.latency_samples),
            latency_buckets: array::from_fn(|index| {
                self.latency_buckets[index].saturating_sub(other.latency_buckets[index])
            }),
        }
    }
}

impl fmt::Display for OpStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "submitted: {}, succeeded: {}, failed: {}, expired: {}, mean latency: {} ms, p99: {} ms",
            self.submitted,
            self.succeeded,
            self.failed,
            self.expired,
            self.mean_latency_ms(),
            self.latency_percentile_ms(0.99),
        )
    }
}

/// Snapshot of a whole emit job.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestStats {
    pub inference: OpStats,
    pub verify: OpStats,
    pub aggregate: OpStats,
    pub tasks: OpStats,
}

impl RequestStats {
    fn http_ops(&self) -> [(&'static str, &OpStats); 3] {
        [
            ("inference", &self.inference),
            ("verify", &self.verify),
            ("aggregate", &self.aggregate),
        ]
    }

    /// Direct HTTP submissions; task completions are derived work and are
    /// not double counted here.
    pub fn total_submitted(&self) -> u64 {
        self.http_ops().iter().map(|(_, op)| op.submitted).sum()
    }

    pub fn total_succeeded(&self) -> u64 {
        self.http_ops().iter().map(|(_, op)| op.succeeded).sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.http_ops()
            .iter()
            .map(|(_, op)| op.failed + op.expired)
            .sum()
    }

    pub fn rate(&self, window: Duration) -> RequestStatsRate {
        RequestStatsRate {
            inference: self.inference.rate(window),
            verify: self.verify.rate(window),
            aggregate: self.aggregate.rate(window),
            tasks: self.tasks.rate(window),
        }
    }
}

impl Sub for &RequestStats {
    type Output = RequestStats;

    fn sub(self, other: &RequestStats) -> RequestStats {
        RequestStats {
            inference: &self.inference - &other.inference,
            verify: &self.verify - &other.verify,
            aggregate: &self.aggregate - &other.aggregate,
            tasks: &self.tasks - &other.tasks,
        }
    }
}

impl fmt::Display for RequestStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "inference: {}", self.inference)?;
        writeln!(f, "verify:    {}", self.verify)?;
        writeln!(f, "aggregate: {}", self.aggregate)?;
        write!(f, "tasks:     {}", self.tasks)
    }
}

/// Per-second view of a stats delta, for the periodic log line.
#[derive(Clone, Copy, Debug)]
pub struct RequestStatsRate {
    pub inference: OpStatsRate,
    pub verify: OpStatsRate,
    pub aggregate: OpStatsRate,
    pub tasks: OpStatsRate,
}

#[derive(Clone, Copy, Debug)]
pub struct OpStatsRate {
    pub submitted_per_s: f64,
    pub succeeded_per_s: f64,
    pub failed_per_s: f64,
    pub expired_per_s: f64,
    pub mean_latency_ms: u64,
    pub p99_latency_ms: u64,
}

impl fmt::Display for RequestStatsRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = [
            ("inference", &self.inference),
            ("verify", &self.verify),
            ("aggregate", &self.aggregate),
            ("tasks", &self.tasks),
        ]
        .iter()
        .map(|(name, rate)| {
            format!(
                "{}: {:.1} req/s ({:.1} ok/s, {:.1} failed/s, mean {} ms)",
                name,
                rate.submitted_per_s,
                rate.succeeded_per_s,
                rate.failed_per_s + rate.expired_per_s,
                rate.mean_latency_ms,
            )
        })
        .join("  |  ");
        write!(f, "{}", line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_reflects_recorded_events() {
        let acc = OpStatsAccumulator::default();
        acc.record_submitted();
        acc.record_submitted();
        acc.record_success(Duration::from_millis(150));
        acc.record_failure();
        let stats = acc.accumulate();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.mean_latency_ms(), 150);
    }

    #[test]
    fn subtraction_gives_windowed_deltas() {
        let acc = OpStatsAccumulator::default();
        acc.record_submitted();
        acc.record_success(Duration::from_millis(100));
        let first = acc.accumulate();
        acc.record_submitted();
        acc.record_success(Duration::from_millis(300));
        let second = acc.accumulate();
        let delta = &second - &first;
        assert_eq!(delta.submitted, 1);
        assert_eq!(delta.succeeded, 1);
        assert_eq!(delta.mean_latency_ms(), 300);
    }

    #[test]
    fn histogram_buckets_by_doubling_upper_bounds() {
        let histogram = LatencyHistogram::default();
        histogram.record(50); // <= 100ms, bucket 0
        histogram.record(150); // <= 200ms, bucket 1
        histogram.record(20_000); // <= 25600ms, bucket 8
        histogram.record(1_000_000); // over the top, clamped to bucket 8
        let snapshot = histogram.snapshot();
        assert_eq!(snapshot[0], 1);
        assert_eq!(snapshot[1], 1);
        assert_eq!(snapshot[LATENCY_BUCKET_COUNT - 1], 2);
    }

    #[test]
    fn percentile_walks_the_buckets() {
        let acc = OpStatsAccumulator::default();
        for _ in 0..99 {
            acc.record_success(Duration::from_millis(80));
        }
        acc.record_success(Duration::from_millis(10_000));
        let stats = acc.accumulate();
        assert_eq!(stats.latency_percentile_ms(0.5), 100);
        assert_eq!(stats.latency_percentile_ms(1.0), 12_800);
    }

    #[test]
    fn percentile_of_empty_stats_is_zero() {
        assert_eq!(OpStats::default().latency_percentile_ms(0.99), 0);
        assert_eq!(OpStats::default().mean_latency_ms(), 0);
    }

    #[test]
    fn totals_exclude_task_monitors() {
        let acc = StatsAccumulator::default();
        acc.inference.record_submitted();
        acc.verify.record_submitted();
        acc.tasks.record_submitted();
        let stats = acc.accumulate();
        assert_eq!(stats.total_submitted(), 2);
    }

    #[test]
    fn display_renders_without_panicking() {
        let stats = StatsAccumulator::default().accumulate();
        let _ = format!("{}", stats);
        let _ = format!("{}", stats.rate(Duration::from_secs(10)));
    }
}
