// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

use crate::{args::ClusterArgs, emitter::RETRY_POLICY, instance::Instance};
use anyhow::{anyhow, bail, Context, Result};
use futures::{stream::FuturesUnordered, StreamExt};
use log::{info, warn};
use rand::seq::SliceRandom;

/// The set of reachable target deployments for one emitter run.
#[derive(Debug)]
pub struct Cluster {
    instances: Vec<Instance>,
}

impl Cluster {
    pub async fn try_from_cluster_args(args: &ClusterArgs) -> Result<Self> {
        Self::from_instances(instances_from_args(args)?).await
    }

    /// Probes every instance concurrently and keeps the reachable ones. An
    /// instance is considered reachable as soon as it answers with any HTTP
    /// response; the API has no dedicated health endpoint.
    pub async fn from_instances(instances: Vec<Instance>) -> Result<Self> {
        let futures = FuturesUnordered::new();
        for instance in instances {
            futures.push(async move {
                let result = async {
                    let client = instance
                        .rest_client()
                        .with_context(|| format!("building a client for {}", instance))?;
                    RETRY_POLICY
                        .retry(|| client.probe())
                        .await
                        .with_context(|| format!("probing {}", instance))?;
                    Ok::<(), anyhow::Error>(())
                }
                .await;
                (instance, result)
            });
        }
        let results: Vec<_> = futures.collect().await;

        let mut healthy = Vec::new();
        let mut errors = Vec::new();
        for (instance, result) in results {
            match result {
                Ok(()) => healthy.push(instance),
                Err(err) => {
                    warn!(
                        "Excluding target {} because probing it failed",
                        instance.peer_name()
                    );
                    errors.push(err);
                }
            }
        }

        if !errors.is_empty() {
            warn!(
                "Failed to probe {} target(s), {} remain: {:?}",
                errors.len(),
                healthy.len(),
                errors
            );
        }
        if healthy.is_empty() {
            bail!("no target is reachable: {:?}", errors);
        }

        // FuturesUnordered completion order is arbitrary; keep worker
        // assignment stable across runs.
        healthy.sort_by(|a, b| a.peer_name().cmp(b.peer_name()));
        info!("Emitting against {} target(s)", healthy.len());
        Ok(Self { instances: healthy })
    }

    pub fn all_instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter()
    }

    pub fn random_instance(&self) -> &Instance {
        self.instances
            .choose(&mut rand::thread_rng())
            .expect("cluster instances are never empty")
    }
}

/// Validates the target URLs and pairs them with the shared credentials. Kept
/// separate from probing so `diag` can report on unreachable targets instead
/// of dropping them.
pub(crate) fn instances_from_args(args: &ClusterArgs) -> Result<Vec<Instance>> {
    let mut instances = Vec::with_capacity(args.targets.len());
    for url in &args.targets {
        let host = url
            .host_str()
            .ok_or_else(|| anyhow!("target URL has no host: {}", url))?;
        let port = url.port_or_known_default().unwrap_or(443);
        instances.push(Instance::new(
            format!("{}:{}", host, port),
            url.clone(),
            args.api_key.clone(),
            args.gpu_id.clone(),
        ));
    }
    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn instances_get_named_after_host_and_port() {
        let args = ClusterArgs::try_parse_from([
            "emit",
            "--targets",
            "https://api.scoria.ai/v1",
            "http://localhost:8080/v1",
        ])
        .unwrap();
        let instances = instances_from_args(&args).unwrap();
        assert_eq!(instances[0].peer_name(), "api.scoria.ai:443");
        assert_eq!(instances[1].peer_name(), "localhost:8080");
    }

    #[test]
    fn hostless_targets_are_rejected() {
        let args = ClusterArgs::try_parse_from(["emit", "--targets", "unix:/tmp/sock"]).unwrap();
        assert!(instances_from_args(&args).is_err());
    }
}
