// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use async_trait::async_trait;
use rand::rngs::StdRng;
use scoria_rest_client::Client;
use serde::Serialize;

pub mod aggregate_generator;
pub mod args;
pub mod evm_generator;
pub mod inference_generator;
pub mod mix_generator;
pub mod solana_generator;

pub use aggregate_generator::{AggregateGenerator, AggregatePayload};
pub use args::WorkloadProfileArg;
pub use evm_generator::{EvmVerifyGenerator, EvmVerifyPayload};
pub use inference_generator::{InferenceGenerator, InferencePayload, Precision};
pub use mix_generator::{MixRequestGenerator, MixRequestGeneratorCreator, WorkloadMix};
pub use solana_generator::{SolanaVerifyGenerator, SolanaVerifyPayload};

/// Model version stamped on every inference payload.
pub const MODEL_VERSION: &str = "scoria-2.1.0";

/// Width of one inference input row.
pub const INPUT_WIDTH: usize = 768;

/// Rows per inference payload when GPU stress testing is enabled.
pub const GPU_STRESS_BATCH_ROWS: usize = 8;

/// One request body ready to be fired at the API.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum ApiRequest {
    Inference(InferencePayload),
    BlockchainVerify(VerifyPayload),
    PrivacyAggregate(AggregatePayload),
}

impl ApiRequest {
    /// Short operation name used for stats and log labels.
    pub fn operation(&self) -> &'static str {
        match self {
            ApiRequest::Inference(_) => "inference",
            ApiRequest::BlockchainVerify(_) => "verify",
            ApiRequest::PrivacyAggregate(_) => "aggregate",
        }
    }
}

/// Verification payloads come in two chain flavors with different shapes;
/// both go to the same endpoint.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum VerifyPayload {
    Solana(SolanaVerifyPayload),
    Evm(EvmVerifyPayload),
}

#[async_trait]
pub trait RequestGenerator: Send {
    /// One-time per-session setup against the target deployment.
    async fn setup(&mut self, _client: &Client) {
        // default implementation is empty.
    }

    fn generate(&mut self) -> ApiRequest;
}

pub trait RequestGeneratorCreator: Sync + Send {
    fn create_request_generator(&self, rng: StdRng) -> Box<dyn RequestGenerator>;
}
