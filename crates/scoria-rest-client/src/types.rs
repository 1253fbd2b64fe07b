// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

use serde::Deserialize;

/// Receipt returned by `POST /inference` on 202.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InferenceReceipt {
    pub task_id: String,
}

/// Receipt returned by `POST /blockchain/verify`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyReceipt {
    pub signature: String,
}

/// Response body of `POST /privacy/aggregate`. The endpoint has no required
/// fields; the root is present once the aggregation has been scheduled.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct AggregateReceipt {
    #[serde(default)]
    pub aggregate_root: Option<String>,
}

/// Response body of `GET /tasks/{id}`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TaskStatus {
    pub status: TaskState,
    #[serde(default)]
    pub progress: Option<f32>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
    /// States the API may grow that this client does not know about.
    #[serde(other)]
    Unknown,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

// Wire-level bodies. Required fields are optional here so that a 2xx response
// missing one maps to RestError::MissingField rather than a decode error.

#[derive(Deserialize)]
pub(crate) struct RawInferenceReceipt {
    pub(crate) task_id: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct RawVerifyReceipt {
    pub(crate) signature: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_state_parses_known_states() {
        let status: TaskStatus = serde_json::from_str(r#"{"status":"COMPLETED"}"#).unwrap();
        assert_eq!(status.status, TaskState::Completed);
        assert!(status.status.is_terminal());

        let status: TaskStatus =
            serde_json::from_str(r#"{"status":"RUNNING","progress":0.4}"#).unwrap();
        assert_eq!(status.status, TaskState::Running);
        assert!(!status.status.is_terminal());
        assert_eq!(status.progress, Some(0.4));
    }

    #[test]
    fn task_state_tolerates_unknown_states() {
        let status: TaskStatus = serde_json::from_str(r#"{"status":"QUEUED_GPU"}"#).unwrap();
        assert_eq!(status.status, TaskState::Unknown);
        assert!(!status.status.is_terminal());
    }

    #[test]
    fn failed_is_terminal() {
        let status: TaskStatus = serde_json::from_str(r#"{"status":"FAILED"}"#).unwrap();
        assert!(status.status.is_terminal());
    }

    #[test]
    fn raw_receipts_allow_missing_fields() {
        let raw: RawInferenceReceipt = serde_json::from_str("{}").unwrap();
        assert!(raw.task_id.is_none());
        let raw: RawVerifyReceipt = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert!(raw.signature.is_none());
    }
}
