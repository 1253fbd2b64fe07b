// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

pub mod metrics;
pub mod stats;
pub mod submission_worker;
pub mod task_monitor;

use again::RetryPolicy;
use anyhow::{ensure, Result};
use futures::FutureExt;
use log::info;
use once_cell::sync::Lazy;
use rand::{rngs::StdRng, Rng, SeedableRng};
use scoria_request_generator_lib::{
    MixRequestGeneratorCreator, RequestGeneratorCreator, WorkloadMix, GPU_STRESS_BATCH_ROWS,
};
use scoria_rest_client::Client;
use std::{
    cmp::max,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::{runtime::Handle, task::JoinHandle, time};

use crate::emitter::submission_worker::SubmissionWorker;
use stats::{RequestStats, StatsAccumulator};

// This retry policy is used for calls necessary for setting up the test
// (e.g. probing the targets). If these fail, the whole test fails. We never
// use it for load-generating requests; those are counted and moved past.
// This retry policy means an operation will take 8 seconds at most.
pub(crate) static RETRY_POLICY: Lazy<RetryPolicy> = Lazy::new(|| {
    RetryPolicy::exponential(Duration::from_millis(125))
        .with_max_retries(6)
        .with_jitter(true)
});

#[derive(Clone, Debug)]
pub struct EmitModeParams {
    pub workers_per_endpoint: usize,

    /// Think-time range between two requests of one worker.
    pub min_wait_millis: u64,
    pub max_wait_millis: u64,

    /// Worker starts are staggered so a big fleet does not fire in lockstep.
    pub start_offset_multiplier_millis: f64,
    pub start_jitter_millis: u64,

    pub task_poll_interval: Duration,
    pub task_timeout: Duration,
    pub aggregate_timeout: Duration,
}

#[derive(Clone, Copy, Debug)]
pub enum EmitJobMode {
    /// Size the worker fleet so the steady-state request rate approximates
    /// the cap.
    ConstRps { rps: usize },
    /// Run a fixed number of simulated users.
    Users { users: usize },
}

#[derive(Clone, Debug)]
pub struct EmitJobRequest {
    rest_clients: Vec<Client>,
    mode: EmitJobMode,
    pub duration: Duration,

    workload: WorkloadMix,
    gpu_stress: bool,
    min_wait_millis: u64,
    max_wait_millis: u64,
    task_poll_interval: Duration,
    task_timeout: Duration,
    aggregate_timeout: Duration,
}

impl Default for EmitJobRequest {
    fn default() -> Self {
        Self {
            rest_clients: Vec::new(),
            mode: EmitJobMode::ConstRps { rps: 1000 },
            duration: Duration::from_secs(300),
            workload: WorkloadMix::production(),
            gpu_stress: false,
            min_wait_millis: 500,
            max_wait_millis: 5000,
            task_poll_interval: Duration::from_secs(5),
            task_timeout: Duration::from_secs(120),
            aggregate_timeout: Duration::from_secs(30),
        }
    }
}

impl EmitJobRequest {
    pub fn new(rest_clients: Vec<Client>) -> Self {
        Self::default().rest_clients(rest_clients)
    }

    pub fn rest_clients(mut self, rest_clients: Vec<Client>) -> Self {
        self.rest_clients = rest_clients;
        self
    }

    pub fn mode(mut self, mode: EmitJobMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn workload(mut self, workload: WorkloadMix) -> Self {
        self.workload = workload;
        self
    }

    pub fn gpu_stress(mut self, gpu_stress: bool) -> Self {
        self.gpu_stress = gpu_stress;
        self
    }

    pub fn wait_range(mut self, min_wait_millis: u64, max_wait_millis: u64) -> Self {
        self.min_wait_millis = min_wait_millis;
        self.max_wait_millis = max_wait_millis;
        self
    }

    pub fn task_poll_interval(mut self, task_poll_interval: Duration) -> Self {
        self.task_poll_interval = task_poll_interval;
        self
    }

    pub fn task_timeout(mut self, task_timeout: Duration) -> Self {
        self.task_timeout = task_timeout;
        self
    }

    pub fn aggregate_timeout(mut self, aggregate_timeout: Duration) -> Self {
        self.aggregate_timeout = aggregate_timeout;
        self
    }

    pub fn calculate_mode_params(&self) -> EmitModeParams {
        let clients_count = max(self.rest_clients.len(), 1);
        // gen_range needs a non-empty range.
        let max_wait_millis = max(self.max_wait_millis, self.min_wait_millis + 1);
        let mean_wait_millis = (self.min_wait_millis + max_wait_millis) / 2;

        let workers_per_endpoint = match self.mode {
            EmitJobMode::ConstRps { rps } => {
                assert!(rps > 0, "requested rps must be positive");
                // One worker contributes ~1000/mean_wait requests per second,
                // so the fleet needed for the target rate is
                // rps * mean_wait / 1000, split across the endpoints.
                let num_workers_per_endpoint = max(
                    rps * mean_wait_millis as usize / 1000 / clients_count,
                    1,
                );
                info!(" Request emitter target rate is {} req/s", rps);
                num_workers_per_endpoint
            }
            EmitJobMode::Users { users } => {
                assert!(users > 0, "requested users must be positive");
                users.div_ceil(clients_count)
            }
        };

        info!(
            " Will use {} clients and {} workers per client",
            clients_count, workers_per_endpoint
        );

        let total_workers = workers_per_endpoint * clients_count;
        EmitModeParams {
            workers_per_endpoint,
            min_wait_millis: self.min_wait_millis,
            max_wait_millis,
            // Spread worker starts across one think period.
            start_offset_multiplier_millis: mean_wait_millis as f64 / total_workers as f64,
            start_jitter_millis: mean_wait_millis.min(2000),
            task_poll_interval: self.task_poll_interval,
            task_timeout: self.task_timeout,
            aggregate_timeout: self.aggregate_timeout,
        }
    }
}

#[derive(Debug)]
struct Worker {
    join_handle: JoinHandle<()>,
}

#[derive(Debug)]
pub struct EmitJob {
    workers: Vec<Worker>,
    stop: Arc<AtomicBool>,
    stats: Arc<StatsAccumulator>,
}

#[derive(Debug)]
pub struct RequestEmitter {
    rng: StdRng,
}

impl RequestEmitter {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn from_rng(&mut self) -> StdRng {
        StdRng::from_rng(self.rng()).unwrap()
    }

    pub async fn start_job(&mut self, req: EmitJobRequest) -> Result<EmitJob> {
        ensure!(
            !req.rest_clients.is_empty(),
            "no target clients to emit against"
        );
        let mode_params = req.calculate_mode_params();
        let workers_per_endpoint = mode_params.workers_per_endpoint;
        let num_workers = req.rest_clients.len() * workers_per_endpoint;
        info!(
            "Will use {} workers per endpoint for a total of {} workers",
            workers_per_endpoint, num_workers
        );

        let batch_rows = if req.gpu_stress {
            GPU_STRESS_BATCH_ROWS
        } else {
            1
        };
        let generator_creator: Box<dyn RequestGeneratorCreator> =
            Box::new(MixRequestGeneratorCreator::new(req.workload, batch_rows));

        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(StatsAccumulator::default());
        let tokio_handle = Handle::current();
        let start_instant = Instant::now();
        let mut workers = vec![];
        for client in &req.rest_clients {
            for _ in 0..workers_per_endpoint {
                let start_sleep_duration = Duration::from_millis(
                    (mode_params.start_offset_multiplier_millis * workers.len() as f64) as u64
                        + self.rng.gen_range(0..=mode_params.start_jitter_millis),
                );
                let worker = SubmissionWorker::new(
                    client.clone(),
                    generator_creator.create_request_generator(self.from_rng()),
                    stop.clone(),
                    mode_params.clone(),
                    stats.clone(),
                    start_sleep_duration,
                    self.from_rng(),
                );
                let join_handle = tokio_handle.spawn(worker.run(start_instant).boxed());
                workers.push(Worker { join_handle });
            }
        }
        info!("Request emitter workers started");
        Ok(EmitJob {
            workers,
            stop,
            stats,
        })
    }

    pub async fn stop_job(&mut self, job: EmitJob) -> RequestStats {
        job.stop.store(true, Ordering::Relaxed);
        for worker in job.workers {
            worker
                .join_handle
                .await
                .expect("RequestEmitter worker task failed");
        }
        job.stats.accumulate()
    }

    pub fn peek_job_stats(&self, job: &EmitJob) -> RequestStats {
        job.stats.accumulate()
    }

    pub async fn periodic_stat(&mut self, job: &EmitJob, duration: Duration, interval_secs: u64) {
        let deadline = Instant::now() + duration;
        let mut prev_stats: Option<RequestStats> = None;
        let window = Duration::from_secs(max(interval_secs, 1));
        while Instant::now() < deadline {
            time::sleep(window).await;
            let stats = self.peek_job_stats(job);
            let delta = &stats - &prev_stats.unwrap_or_default();
            prev_stats = Some(stats);
            metrics::record_window(&delta, window);
            info!("{}", delta.rate(window));
        }
    }

    pub async fn emit_requests_for(&mut self, emit_job_request: EmitJobRequest) -> Result<RequestStats> {
        let duration = emit_job_request.duration;
        let job = self.start_job(emit_job_request).await?;
        info!("Starting emitting requests for {} secs", duration.as_secs());
        time::sleep(duration).await;
        info!("Ran for {} secs, stopping job...", duration.as_secs());
        let stats = self.stop_job(job).await;
        info!("Stopped job");
        Ok(stats)
    }

    pub async fn emit_requests_for_with_stats(
        &mut self,
        emit_job_request: EmitJobRequest,
        interval_secs: u64,
    ) -> Result<RequestStats> {
        let duration = emit_job_request.duration;
        info!("Starting emitting requests for {} secs", duration.as_secs());
        let job = self.start_job(emit_job_request).await?;
        self.periodic_stat(&job, duration, interval_secs).await;
        info!("Ran for {} secs, stopping job...", duration.as_secs());
        let stats = self.stop_job(job).await;
        info!("Stopped job");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_clients(count: usize) -> EmitJobRequest {
        // Dummy clients; mode-param math only needs the count.
        let clients = (0..count)
            .map(|i| {
                Client::new(url::Url::parse(&format!("http://127.0.0.1:{}/v1", 8000 + i)).unwrap())
                    .unwrap()
            })
            .collect();
        EmitJobRequest::new(clients)
    }

    #[test]
    fn const_rps_sizes_the_fleet_from_mean_think_time() {
        let params = request_with_clients(2)
            .mode(EmitJobMode::ConstRps { rps: 1000 })
            .wait_range(500, 5000)
            .calculate_mode_params();
        // mean wait 2750ms -> 2750 workers total, 1375 per endpoint.
        assert_eq!(params.workers_per_endpoint, 1375);
    }

    #[test]
    fn const_rps_never_drops_below_one_worker() {
        let params = request_with_clients(4)
            .mode(EmitJobMode::ConstRps { rps: 1 })
            .wait_range(500, 5000)
            .calculate_mode_params();
        assert_eq!(params.workers_per_endpoint, 1);
    }

    #[test]
    fn users_mode_splits_across_endpoints() {
        let params = request_with_clients(3)
            .mode(EmitJobMode::Users { users: 10 })
            .calculate_mode_params();
        assert_eq!(params.workers_per_endpoint, 4);
    }

    #[test]
    fn degenerate_wait_range_is_widened() {
        let params = request_with_clients(1)
            .mode(EmitJobMode::Users { users: 1 })
            .wait_range(1000, 1000)
            .calculate_mode_params();
        assert!(params.max_wait_millis > params.min_wait_millis);
    }

    #[test]
    fn default_timeouts_match_the_api_contract() {
        let req = EmitJobRequest::default();
        assert_eq!(req.task_poll_interval, Duration::from_secs(5));
        assert_eq!(req.task_timeout, Duration::from_secs(120));
        assert_eq!(req.aggregate_timeout, Duration::from_secs(30));
        assert_eq!(req.min_wait_millis, 500);
        assert_eq!(req.max_wait_millis, 5000);
    }
}
