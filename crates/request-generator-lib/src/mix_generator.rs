// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

use crate::{
    aggregate_generator::AggregateGenerator, evm_generator::EvmVerifyGenerator,
    inference_generator::InferenceGenerator, solana_generator::SolanaVerifyGenerator, ApiRequest,
    RequestGenerator, RequestGeneratorCreator,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Integer weights for the operation mix a worker draws from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkloadMix {
    pub inference: usize,
    pub solana_verify: usize,
    pub evm_verify: usize,
    pub aggregate: usize,
}

impl WorkloadMix {
    /// The production traffic profile: inference 5, verify 3, aggregate 2.
    pub fn production() -> Self {
        Self {
            inference: 5,
            solana_verify: 3,
            evm_verify: 0,
            aggregate: 2,
        }
    }

    pub fn total(&self) -> usize {
        self.inference + self.solana_verify + self.evm_verify + self.aggregate
    }
}

impl Default for WorkloadMix {
    fn default() -> Self {
        Self::production()
    }
}

/// Draws one child generator per call, weighted by the mix.
pub struct MixRequestGenerator {
    rng: StdRng,
    children: Vec<(usize, Box<dyn RequestGenerator>)>,
    total_weight: usize,
}

impl MixRequestGenerator {
    pub fn new(mut rng: StdRng, mix: WorkloadMix, batch_rows: usize) -> Self {
        assert!(mix.total() > 0, "workload mix has no weight");
        let mut children: Vec<(usize, Box<dyn RequestGenerator>)> = Vec::new();
        if mix.inference > 0 {
            let child_rng = StdRng::from_rng(&mut rng).unwrap();
            children.push((
                mix.inference,
                Box::new(InferenceGenerator::new(child_rng, batch_rows)),
            ));
        }
        if mix.solana_verify > 0 {
            let child_rng = StdRng::from_rng(&mut rng).unwrap();
            children.push((
                mix.solana_verify,
                Box::new(SolanaVerifyGenerator::new(child_rng)),
            ));
        }
        if mix.evm_verify > 0 {
            let child_rng = StdRng::from_rng(&mut rng).unwrap();
            children.push((mix.evm_verify, Box::new(EvmVerifyGenerator::new(child_rng))));
        }
        if mix.aggregate > 0 {
            let child_rng = StdRng::from_rng(&mut rng).unwrap();
            children.push((mix.aggregate, Box::new(AggregateGenerator::new(child_rng))));
        }
        let total_weight = children.iter().map(|(weight, _)| weight).sum();
        Self {
            rng,
            children,
            total_weight,
        }
    }
}

impl RequestGenerator for MixRequestGenerator {
    fn generate(&mut self) -> ApiRequest {
        let mut pick = self.rng.gen_range(0..self.total_weight);
        for (weight, child) in self.children.iter_mut() {
            if pick < *weight {
                return child.generate();
            }
            pick -= *weight;
        }
        unreachable!("pick exceeded total weight");
    }
}

pub struct MixRequestGeneratorCreator {
    mix: WorkloadMix,
    batch_rows: usize,
}

impl MixRequestGeneratorCreator {
    pub fn new(mix: WorkloadMix, batch_rows: usize) -> Self {
        Self { mix, batch_rows }
    }
}

impl RequestGeneratorCreator for MixRequestGeneratorCreator {
    fn create_request_generator(&self, rng: StdRng) -> Box<dyn RequestGenerator> {
        Box::new(MixRequestGenerator::new(rng, self.mix, self.batch_rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VerifyPayload;
    use rand::SeedableRng;

    fn draw_counts(mix: WorkloadMix, draws: usize) -> (usize, usize, usize, usize) {
        let mut generator = MixRequestGenerator::new(StdRng::seed_from_u64(17), mix, 1);
        let (mut inference, mut solana, mut evm, mut aggregate) = (0, 0, 0, 0);
        for _ in 0..draws {
            match generator.generate() {
                ApiRequest::Inference(_) => inference += 1,
                ApiRequest::BlockchainVerify(VerifyPayload::Solana(_)) => solana += 1,
                ApiRequest::BlockchainVerify(VerifyPayload::Evm(_)) => evm += 1,
                ApiRequest::PrivacyAggregate(_) => aggregate += 1,
            }
        }
        (inference, solana, evm, aggregate)
    }

    #[test]
    fn production_mix_follows_the_weights() {
        let (inference, solana, evm, aggregate) = draw_counts(WorkloadMix::production(), 1000);
        assert_eq!(inference + solana + evm + aggregate, 1000);
        assert_eq!(evm, 0);
        // 5:3:2 with a wide tolerance; the rng is seeded so this is stable.
        assert!(inference > solana && solana > aggregate);
        assert!((400..600).contains(&inference), "inference: {}", inference);
        assert!((200..400).contains(&solana), "solana: {}", solana);
        assert!((100..300).contains(&aggregate), "aggregate: {}", aggregate);
    }

    #[test]
    fn single_operation_mix_only_draws_that_operation() {
        let mix = WorkloadMix {
            inference: 1,
            solana_verify: 0,
            evm_verify: 0,
            aggregate: 0,
        };
        let (inference, solana, evm, aggregate) = draw_counts(mix, 100);
        assert_eq!((inference, solana, evm, aggregate), (100, 0, 0, 0));
    }

    #[test]
    fn evm_traffic_is_generated_when_weighted() {
        let mix = WorkloadMix {
            inference: 0,
            solana_verify: 1,
            evm_verify: 1,
            aggregate: 0,
        };
        let (_, solana, evm, _) = draw_counts(mix, 200);
        assert!(solana > 0 && evm > 0);
    }

    #[test]
    #[should_panic(expected = "workload mix has no weight")]
    fn empty_mix_is_rejected() {
        let mix = WorkloadMix {
            inference: 0,
            solana_verify: 0,
            evm_verify: 0,
            aggregate: 0,
        };
        MixRequestGenerator::new(StdRng::seed_from_u64(0), mix, 1);
    }

    #[test]
    fn creator_produces_independent_streams() {
        let creator = MixRequestGeneratorCreator::new(WorkloadMix::production(), 1);
        let mut a = creator.create_request_generator(StdRng::seed_from_u64(1));
        let mut b = creator.create_request_generator(StdRng::seed_from_u64(2));
        let ops_a: Vec<_> = (0..16).map(|_| a.generate().operation()).collect();
        let ops_b: Vec<_> = (0..16).map(|_| b.generate().operation()).collect();
        assert_ne!(ops_a, ops_b);
    }
}
