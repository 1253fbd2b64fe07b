// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod client;
mod error;
mod response;
mod types;

pub use client::{Client, ClientBuilder, DEFAULT_GPU_ID, USER_AGENT};
pub use error::RestError;
pub use response::Response;
pub use types::{AggregateReceipt, InferenceReceipt, TaskState, TaskStatus, VerifyReceipt};

pub type Result<T, E = RestError> = std::result::Result<T, E>;
