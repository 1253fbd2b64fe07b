// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics for the request emitter.
//!
//! These metrics provide real-time visibility into request submission
//! performance and can be scraped or pushed to any Prometheus-compatible
//! endpoint.

use crate::emitter::stats::{OpStats, RequestStats};
use once_cell::sync::Lazy;
use prometheus::{
    exponential_buckets, register_histogram_vec, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounterVec, IntGauge,
};
use std::time::Duration;

/// Counter for total requests submitted, per operation.
pub static REQUEST_EMITTER_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "request_emitter_submitted_total",
        "Total number of requests submitted by the emitter",
        &["operation"]
    )
    .unwrap()
});

/// Counter for total requests that succeeded.
pub static REQUEST_EMITTER_SUCCEEDED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "request_emitter_succeeded_total",
        "Total number of requests that succeeded",
        &["operation"]
    )
    .unwrap()
});

/// Counter for total failed requests.
pub static REQUEST_EMITTER_FAILED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "request_emitter_failed_total",
        "Total number of failed requests",
        &["operation"]
    )
    .unwrap()
});

/// Counter for total requests that timed out (slow aggregations, tasks that
/// never reached a terminal state).
pub static REQUEST_EMITTER_EXPIRED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "request_emitter_expired_total",
        "Total number of requests that timed out",
        &["operation"]
    )
    .unwrap()
});

/// Histogram for request latency in seconds.
/// Buckets range from 100ms to ~26 seconds (exponential).
pub static REQUEST_EMITTER_LATENCY_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "request_emitter_latency_seconds",
        "Request latency from submission to response in seconds",
        &["operation"],
        // Buckets from 0.1s to ~26s
        exponential_buckets(0.1, 2.0, 9).unwrap()
    )
    .unwrap()
});

/// Gauge for current submitted requests per second.
pub static REQUEST_EMITTER_SUBMITTED_RPS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "request_emitter_submitted_rps",
        "Current submitted requests per second"
    )
    .unwrap()
});

/// Gauge for current succeeded requests per second.
pub static REQUEST_EMITTER_SUCCEEDED_RPS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "request_emitter_succeeded_rps",
        "Current succeeded requests per second"
    )
    .unwrap()
});

/// Records one windowed stats delta for a single operation.
pub fn record_op_delta(operation: &str, delta: &OpStats) {
    REQUEST_EMITTER_SUBMITTED
        .with_label_values(&[operation])
        .inc_by(delta.submitted);
    REQUEST_EMITTER_SUCCEEDED
        .with_label_values(&[operation])
        .inc_by(delta.succeeded);
    REQUEST_EMITTER_FAILED
        .with_label_values(&[operation])
        .inc_by(delta.failed);
    REQUEST_EMITTER_EXPIRED
        .with_label_values(&[operation])
        .inc_by(delta.expired);

    // Record one observation per request to properly weight the histogram;
    // only the mean survives the atomic counters.
    let mean_latency_secs = delta.mean_latency_ms() as f64 / 1000.0;
    for _ in 0..delta.latency_samples {
        REQUEST_EMITTER_LATENCY_SECONDS
            .with_label_values(&[operation])
            .observe(mean_latency_secs);
    }
}

/// Updates RPS gauges with current rates.
pub fn update_rps_gauges(submitted_rps: f64, succeeded_rps: f64) {
    REQUEST_EMITTER_SUBMITTED_RPS.set(submitted_rps as i64);
    REQUEST_EMITTER_SUCCEEDED_RPS.set(succeeded_rps as i64);
}

/// Pushes a whole windowed delta into the metrics above.
pub fn record_window(delta: &RequestStats, window: Duration) {
    for (operation, op) in [
        ("inference", &delta.inference),
        ("verify", &delta.verify),
        ("aggregate", &delta.aggregate),
        ("task", &delta.tasks),
    ] {
        record_op_delta(operation, op);
    }
    let secs = window.as_secs_f64();
    if secs > 0.0 {
        update_rps_gauges(
            delta.total_submitted() as f64 / secs,
            delta.total_succeeded() as f64 / secs,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_op_delta() {
        // Just verify it doesn't panic
        let delta = OpStats {
            submitted: 100,
            succeeded: 95,
            failed: 4,
            expired: 1,
            latency_sum_ms: 9500,
            latency_samples: 95,
            ..Default::default()
        };
        record_op_delta("inference", &delta);
    }

    #[test]
    fn test_update_rps_gauges() {
        update_rps_gauges(1000.5, 995.0);
    }

    #[test]
    fn test_record_window() {
        record_window(&RequestStats::default(), Duration::from_secs(10));
    }
}
