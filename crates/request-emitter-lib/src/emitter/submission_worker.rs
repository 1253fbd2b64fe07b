// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

use crate::emitter::{stats::StatsAccumulator, task_monitor::monitor_task, EmitModeParams};
use futures::future::join_all;
use log::{debug, warn};
use rand::{rngs::StdRng, Rng};
use scoria_request_generator_lib::{ApiRequest, RequestGenerator};
use scoria_rest_client::{Client, RestError};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::{
    task::JoinHandle,
    time::{sleep, sleep_until},
};

const ALLOWED_EARLY: Duration = Duration::from_micros(500);

/// At most one warn-level failure line per worker per this period; the rest
/// go to debug. Failures are always counted.
const FAILURE_LOG_PERIOD: Duration = Duration::from_secs(10);

pub struct SubmissionWorker {
    client: Client,
    generator: Box<dyn RequestGenerator>,
    stop: Arc<AtomicBool>,
    params: EmitModeParams,
    stats: Arc<StatsAccumulator>,
    start_sleep_duration: Duration,
    monitors: Vec<JoinHandle<()>>,
    last_failure_log: Option<Instant>,
    rng: StdRng,
}

impl SubmissionWorker {
    pub fn new(
        client: Client,
        generator: Box<dyn RequestGenerator>,
        stop: Arc<AtomicBool>,
        params: EmitModeParams,
        stats: Arc<StatsAccumulator>,
        start_sleep_duration: Duration,
        rng: StdRng,
    ) -> Self {
        Self {
            client,
            generator,
            stop,
            params,
            stats,
            start_sleep_duration,
            monitors: Vec::new(),
            last_failure_log: None,
            rng,
        }
    }

    pub(crate) async fn run(mut self, start_instant: Instant) {
        sleep_check_done(&self.stop, start_instant + self.start_sleep_duration).await;
        self.generator.setup(&self.client).await;

        while !self.stop.load(Ordering::Relaxed) {
            let request = self.generator.generate();
            self.dispatch(request).await;
            self.monitors.retain(|handle| !handle.is_finished());

            let think = Duration::from_millis(
                self.rng
                    .gen_range(self.params.min_wait_millis..self.params.max_wait_millis),
            );
            sleep_check_done(&self.stop, Instant::now() + think).await;
        }

        // Monitors watch the stop flag too; give them a chance to wind down.
        let monitors: Vec<_> = self.monitors.drain(..).collect();
        join_all(monitors).await;
    }

    async fn dispatch(&mut self, request: ApiRequest) {
        match request {
            ApiRequest::Inference(payload) => {
                self.stats.inference.record_submitted();
                let submit_time = Instant::now();
                match self.client.submit_inference(&payload).await {
                    Ok(response) => {
                        self.stats.inference.record_success(response.elapsed());
                        let task_id = response.into_inner().task_id;
                        self.monitors.push(tokio::spawn(monitor_task(
                            self.client.clone(),
                            task_id,
                            self.stats.clone(),
                            self.stop.clone(),
                            self.params.task_poll_interval,
                            self.params.task_timeout,
                            submit_time,
                        )));
                    }
                    Err(error) => {
                        self.stats.inference.record_failure();
                        self.log_failure("inference", &error);
                    }
                }
            }
            ApiRequest::BlockchainVerify(payload) => {
                self.stats.verify.record_submitted();
                match self.client.blockchain_verify(&payload).await {
                    Ok(response) => self.stats.verify.record_success(response.elapsed()),
                    Err(error) => {
                        self.stats.verify.record_failure();
                        self.log_failure("verify", &error);
                    }
                }
            }
            ApiRequest::PrivacyAggregate(payload) => {
                self.stats.aggregate.record_submitted();
                match self.client.privacy_aggregate(&payload).await {
                    Ok(response) if response.elapsed() > self.params.aggregate_timeout => {
                        self.stats.aggregate.record_expired();
                        debug!(
                            "[{}] aggregation exceeded the {}s threshold: took {:.1}s",
                            self.client.base_url(),
                            self.params.aggregate_timeout.as_secs(),
                            response.elapsed().as_secs_f32(),
                        );
                    }
                    Ok(response) => self.stats.aggregate.record_success(response.elapsed()),
                    Err(error) => {
                        self.stats.aggregate.record_failure();
                        self.log_failure("aggregate", &error);
                    }
                }
            }
        }
    }

    fn log_failure(&mut self, operation: &str, error: &RestError) {
        let now = Instant::now();
        let should_warn = self
            .last_failure_log
            .map_or(true, |last| now.duration_since(last) >= FAILURE_LOG_PERIOD);
        if should_warn {
            self.last_failure_log = Some(now);
            warn!(
                "[{}] {} request failed: {}",
                self.client.base_url(),
                operation,
                error
            );
        } else {
            debug!(
                "[{}] {} request failed: {}",
                self.client.base_url(),
                operation,
                error
            );
        }
    }
}

/// Sleeps until the given instant, but returns early once the stop flag is
/// set, polling it at second granularity.
pub(crate) async fn sleep_check_done(stop: &AtomicBool, sleep_until_time: Instant) {
    let sleep_poll_interval = Duration::from_secs(1);
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }

        let now = Instant::now();
        if now + ALLOWED_EARLY > sleep_until_time {
            return;
        }

        if sleep_until_time > now + sleep_poll_interval {
            sleep(sleep_poll_interval).await;
        } else {
            sleep_until(sleep_until_time.into()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sleep_check_done_returns_at_the_deadline() {
        let stop = AtomicBool::new(false);
        let start = Instant::now();
        sleep_check_done(&stop, start + Duration::from_millis(50)).await;
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn sleep_check_done_returns_early_when_stopped() {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = stop.clone();
        let start = Instant::now();
        let sleeper = tokio::spawn(async move {
            sleep_check_done(&stop_clone, Instant::now() + Duration::from_secs(30)).await;
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        stop.store(true, Ordering::Relaxed);
        sleeper.await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
