// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

use crate::WorkloadMix;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Utility enum for specifying a workload mix with predefined weight tables
/// through the CLI.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, ValueEnum)]
pub enum WorkloadProfileArg {
    /// Inference 5 : verify 3 : aggregate 2, the production traffic shape.
    #[default]
    Production,
    InferenceOnly,
    /// Verification-dominated, interleaving Solana and EVM payloads.
    VerifyHeavy,
    /// Inference-dominated, paired with widened inference batches.
    GpuStress,
}

impl WorkloadProfileArg {
    pub fn materialize(&self) -> WorkloadMix {
        match self {
            WorkloadProfileArg::Production => WorkloadMix::production(),
            WorkloadProfileArg::InferenceOnly => WorkloadMix {
                inference: 1,
                solana_verify: 0,
                evm_verify: 0,
                aggregate: 0,
            },
            WorkloadProfileArg::VerifyHeavy => WorkloadMix {
                inference: 2,
                solana_verify: 3,
                evm_verify: 3,
                aggregate: 1,
            },
            WorkloadProfileArg::GpuStress => WorkloadMix {
                inference: 8,
                solana_verify: 1,
                evm_verify: 0,
                aggregate: 1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_is_production() {
        assert_eq!(
            WorkloadProfileArg::default().materialize(),
            WorkloadMix::production()
        );
    }

    #[test]
    fn every_profile_has_weight() {
        for profile in [
            WorkloadProfileArg::Production,
            WorkloadProfileArg::InferenceOnly,
            WorkloadProfileArg::VerifyHeavy,
            WorkloadProfileArg::GpuStress,
        ] {
            assert!(profile.materialize().total() > 0);
        }
    }
}
