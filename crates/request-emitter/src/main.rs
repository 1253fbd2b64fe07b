// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use scoria_request_emitter_lib::{diag, emit_requests, ClusterArgs, EmitArgs};

#[derive(Parser, Debug)]
#[clap(name = "scoria-request-emitter", version)]
struct Args {
    #[clap(subcommand)]
    command: EmitterCommand,
}

#[derive(Subcommand, Debug)]
enum EmitterCommand {
    /// This is the primary use of the request emitter: drive synthetic
    /// inference, verification and aggregation traffic at the target
    /// deployment(s), recording stats as we go.
    EmitRequests(EmitRequests),

    /// Probe the configured targets and report per-instance health without
    /// emitting any load.
    Diag(Diag),
}

#[derive(Parser, Debug)]
struct EmitRequests {
    #[clap(flatten)]
    cluster_args: ClusterArgs,

    #[clap(flatten)]
    emit_args: EmitArgs,
}

#[derive(Parser, Debug)]
struct Diag {
    #[clap(flatten)]
    cluster_args: ClusterArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match args.command {
        EmitterCommand::EmitRequests(cmd) => {
            let stats = emit_requests(&cmd.cluster_args, &cmd.emit_args).await?;
            println!("{}", stats);
            if stats.total_succeeded() == 0 {
                bail!(
                    "no request succeeded out of {} submitted",
                    stats.total_submitted()
                );
            }
        }
        EmitterCommand::Diag(cmd) => diag(&cmd.cluster_args).await?,
    }
    Ok(())
}
