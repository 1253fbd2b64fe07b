// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

use crate::{ApiRequest, RequestGenerator, VerifyPayload};
use rand::{rngs::StdRng, Rng};
use serde::Serialize;
use sha2::{Digest, Sha256};

const MAX_LAMPORTS: u64 = 1_000_000_000;

/// Body of `POST /blockchain/verify` for Solana transactions.
#[derive(Clone, Debug, Serialize)]
pub struct SolanaVerifyPayload {
    pub sender: String,
    pub receiver: String,
    pub lamports: u64,
    pub model_hash: String,
}

pub struct SolanaVerifyGenerator {
    rng: StdRng,
}

impl SolanaVerifyGenerator {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }

    fn random_pubkey(&mut self) -> String {
        let mut seed = [0u8; 32];
        self.rng.fill(&mut seed);
        pubkey_from_seed(&seed)
    }
}

/// Derives a base58 pubkey string from a 32-byte seed, the way throwaway
/// test accounts are minted: the key material is the hash of the seed.
pub fn pubkey_from_seed(seed: &[u8; 32]) -> String {
    let digest = Sha256::digest(seed);
    bs58::encode(digest.as_slice()).into_string()
}

impl RequestGenerator for SolanaVerifyGenerator {
    fn generate(&mut self) -> ApiRequest {
        let sender = self.random_pubkey();
        let receiver = self.random_pubkey();
        let lamports = self.rng.gen_range(1..MAX_LAMPORTS);
        let mut preimage = [0u8; 32];
        self.rng.fill(&mut preimage);
        let model_hash = hex::encode(Sha256::digest(preimage));
        ApiRequest::BlockchainVerify(VerifyPayload::Solana(SolanaVerifyPayload {
            sender,
            receiver,
            lamports,
            model_hash,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn generate_one(seed: u64) -> SolanaVerifyPayload {
        let mut generator = SolanaVerifyGenerator::new(StdRng::seed_from_u64(seed));
        match generator.generate() {
            ApiRequest::BlockchainVerify(VerifyPayload::Solana(payload)) => payload,
            other => panic!("unexpected request: {:?}", other.operation()),
        }
    }

    #[test]
    fn pubkeys_decode_to_32_bytes() {
        let payload = generate_one(3);
        for key in [&payload.sender, &payload.receiver] {
            let bytes = bs58::decode(key).into_vec().unwrap();
            assert_eq!(bytes.len(), 32, "bad pubkey {}", key);
        }
        assert_ne!(payload.sender, payload.receiver);
    }

    #[test]
    fn pubkey_derivation_is_deterministic() {
        let seed = [42u8; 32];
        assert_eq!(pubkey_from_seed(&seed), pubkey_from_seed(&seed));
    }

    #[test]
    fn lamports_stay_in_range() {
        for seed in 0..32 {
            let payload = generate_one(seed);
            assert!((1..MAX_LAMPORTS).contains(&payload.lamports));
        }
    }

    #[test]
    fn model_hash_is_sha256_hex() {
        let payload = generate_one(5);
        assert_eq!(payload.model_hash.len(), 64);
        assert!(payload.model_hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
