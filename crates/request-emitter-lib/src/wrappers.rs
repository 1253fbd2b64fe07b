// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

use crate::{
    args::{ClusterArgs, EmitArgs},
    cluster::{instances_from_args, Cluster},
    emitter::{
        stats::RequestStats, EmitJobMode, EmitJobRequest, RequestEmitter, RETRY_POLICY,
    },
    instance::Instance,
};
use anyhow::{bail, Context, Result};
use log::{info, warn};
use rand::{rngs::OsRng, rngs::StdRng, Rng, SeedableRng};
use scoria_request_generator_lib::GPU_STRESS_BATCH_ROWS;
use std::{
    cmp::{max, min},
    time::Duration,
};

pub async fn emit_requests(
    cluster_args: &ClusterArgs,
    emit_args: &EmitArgs,
) -> Result<RequestStats> {
    let cluster = Cluster::try_from_cluster_args(cluster_args)
        .await
        .context("Failed to build cluster")?;
    emit_requests_with_cluster(&cluster, emit_args).await
}

pub async fn emit_requests_with_cluster(
    cluster: &Cluster,
    args: &EmitArgs,
) -> Result<RequestStats> {
    let mode = match args.users {
        Some(users) => EmitJobMode::Users { users },
        None => EmitJobMode::ConstRps { rps: args.max_rps },
    };
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_seed(OsRng.gen()),
    };

    if args.gpu_stress {
        info!(
            "GPU stress testing enabled: inference batches widened to {} rows",
            GPU_STRESS_BATCH_ROWS
        );
    }

    let rest_clients = cluster
        .all_instances()
        .map(Instance::rest_client)
        .collect::<Result<Vec<_>>>()?;
    let emit_job_request = EmitJobRequest::new(rest_clients)
        .mode(mode)
        .duration(Duration::from_secs(args.duration))
        .workload(args.workload.materialize())
        .gpu_stress(args.gpu_stress)
        .wait_range(args.min_wait_millis, args.max_wait_millis)
        .task_poll_interval(Duration::from_secs(args.task_poll_secs))
        .task_timeout(Duration::from_secs(args.task_timeout_secs));

    let mut emitter = RequestEmitter::new(rng);
    let stats = emitter
        .emit_requests_for_with_stats(
            emit_job_request,
            min(args.stats_interval_secs, max(args.duration / 5, 1)),
        )
        .await?;
    Ok(stats)
}

/// Probes every configured target and reports per-instance health, without
/// dropping the unreachable ones the way a load run does.
pub async fn diag(cluster_args: &ClusterArgs) -> Result<()> {
    let instances = instances_from_args(cluster_args)?;
    let mut healthy = 0;
    for instance in &instances {
        let result = async {
            let client = instance.rest_client()?;
            RETRY_POLICY.retry(|| client.probe()).await?;
            Ok::<(), anyhow::Error>(())
        }
        .await;
        match result {
            Ok(()) => {
                healthy += 1;
                info!("{}: ok", instance);
            }
            Err(error) => warn!("{}: unreachable: {:#}", instance, error),
        }
    }
    info!("{}/{} targets healthy", healthy, instances.len());
    if healthy == 0 {
        bail!("none of the {} configured targets is reachable", instances.len());
    }
    Ok(())
}
