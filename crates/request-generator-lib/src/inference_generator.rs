// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

use crate::{ApiRequest, RequestGenerator, INPUT_WIDTH, MODEL_VERSION};
use rand::{rngs::StdRng, Rng};
use serde::Serialize;

/// Body of `POST /inference`.
#[derive(Clone, Debug, Serialize)]
pub struct InferencePayload {
    pub model_version: String,
    pub input_data: Vec<Vec<f64>>,
    pub precision: Precision,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Fp16,
    Int8,
}

pub struct InferenceGenerator {
    rng: StdRng,
    batch_rows: usize,
}

impl InferenceGenerator {
    pub fn new(rng: StdRng, batch_rows: usize) -> Self {
        Self { rng, batch_rows }
    }
}

impl RequestGenerator for InferenceGenerator {
    fn generate(&mut self) -> ApiRequest {
        let input_data = (0..self.batch_rows)
            .map(|_| {
                (0..INPUT_WIDTH)
                    .map(|_| self.rng.gen_range(0.0..1.0))
                    .collect()
            })
            .collect();
        // fp16 and int8 split evenly, like production traffic.
        let precision = if self.rng.gen_bool(0.5) {
            Precision::Fp16
        } else {
            Precision::Int8
        };
        ApiRequest::Inference(InferencePayload {
            model_version: MODEL_VERSION.to_string(),
            input_data,
            precision,
        })
    }
}
