// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

use crate::{ApiRequest, RequestGenerator};
use rand::{rngs::StdRng, Rng};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Body of `POST /privacy/aggregate`.
#[derive(Clone, Debug, Serialize)]
pub struct AggregatePayload {
    pub model_hashes: Vec<String>,
}

/// Aggregation requests reference the model the session is pinned to, so the
/// hash is minted once per session and reused for every call.
pub struct AggregateGenerator {
    model_hash: String,
}

impl AggregateGenerator {
    pub fn new(mut rng: StdRng) -> Self {
        Self {
            model_hash: session_model_hash(&mut rng),
        }
    }

    pub fn model_hash(&self) -> &str {
        &self.model_hash
    }
}

/// Mints a CIDv0-style content hash (`Qm...`): base58 of the sha2-256
/// multihash prefix plus a random digest.
pub fn session_model_hash(rng: &mut StdRng) -> String {
    let mut preimage = [0u8; 32];
    rng.fill(&mut preimage);
    let digest = Sha256::digest(preimage);
    let mut multihash = Vec::with_capacity(34);
    multihash.extend_from_slice(&[0x12, 0x20]);
    multihash.extend_from_slice(&digest);
    bs58::encode(multihash).into_string()
}

impl RequestGenerator for AggregateGenerator {
    fn generate(&mut self) -> ApiRequest {
        ApiRequest::PrivacyAggregate(AggregatePayload {
            model_hashes: vec![self.model_hash.clone()],
        })
    }
}
