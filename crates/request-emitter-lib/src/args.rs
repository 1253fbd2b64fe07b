// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use scoria_request_generator_lib::WorkloadProfileArg;
use scoria_rest_client::DEFAULT_GPU_ID;
use url::Url;

#[derive(Clone, Debug, Parser)]
pub struct ClusterArgs {
    /// Base URLs of the Scoria API deployments to drive load against.
    #[clap(long, num_args = 1.., default_value = "https://api.scoria.ai/v1")]
    pub targets: Vec<Url>,

    /// Bearer token attached to every request.
    #[clap(long, env = "SCORIA_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Hardware profile reported in the X-GPU-ID header.
    #[clap(long, default_value = DEFAULT_GPU_ID)]
    pub gpu_id: String,
}

#[derive(Clone, Debug, Parser)]
pub struct EmitArgs {
    /// Cap on the steady-state request rate across all workers.
    #[clap(long, default_value_t = 1000, conflicts_with = "users")]
    pub max_rps: usize,

    /// Run a fixed number of simulated users instead of targeting a rate.
    #[clap(long)]
    pub users: Option<usize>,

    /// How long to emit load, in seconds.
    #[clap(long, default_value_t = 300)]
    pub duration: u64,

    /// Which operation mix to draw requests from.
    #[clap(long, value_enum, default_value_t = WorkloadProfileArg::Production)]
    pub workload: WorkloadProfileArg,

    /// Enable GPU stress testing: inference payloads are widened to full
    /// batches.
    #[clap(long)]
    pub gpu_stress: bool,

    /// Shortest think time between two requests of one worker, in
    /// milliseconds.
    #[clap(long, default_value_t = 500)]
    pub min_wait_millis: u64,

    /// Longest think time between two requests of one worker, in
    /// milliseconds.
    #[clap(long, default_value_t = 5000)]
    pub max_wait_millis: u64,

    /// How long to wait for a submitted inference task to reach a terminal
    /// state before counting it as expired, in seconds.
    #[clap(long, default_value_t = 120)]
    pub task_timeout_secs: u64,

    /// Interval between two status polls of a submitted task, in seconds.
    #[clap(long, default_value_t = 5)]
    pub task_poll_secs: u64,

    /// Interval between periodic stat log lines, in seconds.
    #[clap(long, default_value_t = 10)]
    pub stats_interval_secs: u64,

    /// Seed for reproducible payload streams.
    #[clap(long)]
    pub seed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_args_defaults_match_the_production_profile() {
        let args = EmitArgs::try_parse_from(["emit"]).unwrap();
        assert_eq!(args.max_rps, 1000);
        assert_eq!(args.users, None);
        assert_eq!(args.duration, 300);
        assert!(!args.gpu_stress);
        assert_eq!(args.min_wait_millis, 500);
        assert_eq!(args.max_wait_millis, 5000);
        assert_eq!(args.task_timeout_secs, 120);
        assert_eq!(args.task_poll_secs, 5);
    }

    #[test]
    fn max_rps_conflicts_with_users() {
        let result = EmitArgs::try_parse_from(["emit", "--max-rps", "100", "--users", "10"]);
        assert!(result.is_err());
    }

    #[test]
    fn cluster_args_default_to_the_production_host() {
        let args = ClusterArgs::try_parse_from(["emit"]).unwrap();
        assert_eq!(args.targets.len(), 1);
        assert_eq!(args.targets[0].as_str(), "https://api.scoria.ai/v1");
        assert_eq!(args.gpu_id, DEFAULT_GPU_ID);
    }

    #[test]
    fn multiple_targets_are_accepted() {
        let args = ClusterArgs::try_parse_from([
            "emit",
            "--targets",
            "https://a.scoria.ai/v1",
            "https://b.scoria.ai/v1",
        ])
        .unwrap();
        assert_eq!(args.targets.len(), 2);
    }
}
