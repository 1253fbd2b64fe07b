// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

use crate::{ApiRequest, RequestGenerator, VerifyPayload};
use rand::{rngs::StdRng, Rng};
use serde::Serialize;
use tiny_keccak::{Hasher, Keccak};

const CALLDATA_BYTES: usize = 256;
const WEI_PER_ETHER: f64 = 1e18;

/// Body of `POST /blockchain/verify` for EVM transactions. `value` is a
/// decimal wei string; JSON numbers cannot hold 256-bit amounts.
#[derive(Clone, Debug, Serialize)]
pub struct EvmVerifyPayload {
    pub from: String,
    pub to: String,
    pub value: String,
    pub data: String,
}

pub struct EvmVerifyGenerator {
    rng: StdRng,
}

impl EvmVerifyGenerator {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }

    fn random_address(&mut self) -> String {
        let mut address = [0u8; 20];
        self.rng.fill(&mut address);
        checksummed_address(&address)
    }
}

/// EIP-55 mixed-case encoding: a hex digit is uppercased when the matching
/// nibble of keccak256(lowercase_hex_address) is >= 8.
pub fn checksummed_address(address: &[u8; 20]) -> String {
    let lower = hex::encode(address);
    let mut hasher = Keccak::v256();
    hasher.update(lower.as_bytes());
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);

    let mut out = String::with_capacity(2 + lower.len());
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

impl RequestGenerator for EvmVerifyGenerator {
    fn generate(&mut self) -> ApiRequest {
        let from = self.random_address();
        let to = self.random_address();
        let ether = self.rng.gen_range(0.01..100.0);
        let value = ((ether * WEI_PER_ETHER) as u128).to_string();
        let mut calldata = [0u8; CALLDATA_BYTES];
        self.rng.fill(&mut calldata[..]);
        let data = format!("0x{}", hex::encode(calldata));
        ApiRequest::BlockchainVerify(VerifyPayload::Evm(EvmVerifyPayload {
            from,
            to,
            value,
            data,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn generate_one(seed: u64) -> EvmVerifyPayload {
        let mut generator = EvmVerifyGenerator::new(StdRng::seed_from_u64(seed));
        match generator.generate() {
            ApiRequest::BlockchainVerify(VerifyPayload::Evm(payload)) => payload,
            other => panic!("unexpected request: {:?}", other.operation()),
        }
    }

    #[test]
    fn checksum_matches_eip55_vectors() {
        let vectors = [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ];
        for expected in vectors {
            let bytes: [u8; 20] = hex::decode(expected[2..].to_lowercase())
                .unwrap()
                .try_into()
                .unwrap();
            assert_eq!(checksummed_address(&bytes), expected);
        }
    }

    #[test]
    fn addresses_are_checksummed_and_distinct() {
        let payload = generate_one(9);
        for address in [&payload.from, &payload.to] {
            assert!(address.starts_with("0x"));
            assert_eq!(address.len(), 42);
            let bytes: [u8; 20] = hex::decode(address[2..].to_lowercase())
                .unwrap()
                .try_into()
                .unwrap();
            assert_eq!(&checksummed_address(&bytes), address);
        }
        assert_ne!(payload.from, payload.to);
    }

    #[test]
    fn value_is_wei_for_a_sane_ether_amount() {
        for seed in 0..32 {
            let payload = generate_one(seed);
            let wei: u128 = payload.value.parse().unwrap();
            // 0.01 ether .. 100 ether
            assert!(wei >= 10_000_000_000_000_000);
            assert!(wei < 100_000_000_000_000_000_000);
        }
    }

    #[test]
    fn calldata_is_256_bytes_hex() {
        let payload = generate_one(13);
        assert!(payload.data.starts_with("0x"));
        assert_eq!(hex::decode(&payload.data[2..]).unwrap().len(), CALLDATA_BYTES);
    }
}
