// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

use crate::emitter::{stats::StatsAccumulator, submission_worker::sleep_check_done};
use log::debug;
use scoria_rest_client::{Client, TaskState};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// Follows one accepted inference submission until it reaches a terminal
/// state or the deadline passes. Poll errors are transient by assumption and
/// never abort the monitor; a task that stays non-terminal past the deadline
/// is counted as expired. When the job is stopped mid-flight the monitor
/// exits without recording an outcome.
pub(crate) async fn monitor_task(
    client: Client,
    task_id: String,
    stats: Arc<StatsAccumulator>,
    stop: Arc<AtomicBool>,
    poll_interval: Duration,
    timeout: Duration,
    submit_time: Instant,
) {
    stats.tasks.record_submitted();
    let deadline = submit_time + timeout;
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }

        match client.get_task(&task_id).await {
            Ok(response) => match response.inner().status {
                TaskState::Completed => {
                    // End-to-end latency, from submission to observed
                    // completion.
                    stats.tasks.record_success(submit_time.elapsed());
                    return;
                }
                TaskState::Failed => {
                    stats.tasks.record_failure();
                    debug!("[{}] task {} failed", client.base_url(), task_id);
                    return;
                }
                _ => {}
            },
            Err(error) => {
                debug!(
                    "[{}] task {} status poll failed: {}",
                    client.base_url(),
                    task_id,
                    error
                );
            }
        }

        if Instant::now() >= deadline {
            stats.tasks.record_expired();
            debug!(
                "[{}] task {} did not complete within {}s",
                client.base_url(),
                task_id,
                timeout.as_secs()
            );
            return;
        }
        sleep_check_done(&stop, Instant::now() + poll_interval).await;
    }
}
