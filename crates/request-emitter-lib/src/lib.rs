// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod args;
mod cluster;
mod instance;
mod wrappers;

pub mod emitter;

// These are the top level things you should need to run the emitter.
pub use args::{ClusterArgs, EmitArgs};
pub use wrappers::{diag, emit_requests};

// We export these if you want finer grained control.
pub use cluster::Cluster;
pub use emitter::{
    stats::{OpStats, RequestStats, RequestStatsRate},
    EmitJob, EmitJobMode, EmitJobRequest, EmitModeParams, RequestEmitter,
};
pub use instance::Instance;
pub use wrappers::emit_requests_with_cluster;
