// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;
use thiserror::Error;

/// Longest body snippet carried inside an error. Error pages from proxies can
/// be arbitrarily large and they end up in log lines.
const MAX_BODY_SNIPPET: usize = 280;

#[derive(Debug, Error)]
pub enum RestError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("response is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid request URL: {0}")]
    Url(String),

    #[error("invalid API key: {0}")]
    ApiKey(String),
}

impl RestError {
    pub(crate) fn unexpected_status(status: StatusCode, body: &[u8]) -> Self {
        let mut body = String::from_utf8_lossy(body).into_owned();
        if body.len() > MAX_BODY_SNIPPET {
            let mut cut = MAX_BODY_SNIPPET;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
            body.push_str("...");
        }
        Self::UnexpectedStatus { status, body }
    }

    /// Whether the error came from the server side (as opposed to transport
    /// or decoding). Used by callers to distinguish "unreachable" from
    /// "reachable but unhappy".
    pub fn is_status_error(&self) -> bool {
        matches!(self, Self::UnexpectedStatus { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_status_truncates_large_bodies() {
        let body = vec![b'x'; 10_000];
        let err = RestError::unexpected_status(StatusCode::BAD_GATEWAY, &body);
        let rendered = err.to_string();
        assert!(rendered.len() < 400, "error line too long: {}", rendered.len());
        assert!(rendered.contains("502"));
        assert!(rendered.ends_with("..."));
    }

    #[test]
    fn unexpected_status_keeps_short_bodies_intact() {
        let err =
            RestError::unexpected_status(StatusCode::TOO_MANY_REQUESTS, b"{\"error\":\"slow down\"}");
        assert_eq!(
            err.to_string(),
            "unexpected status 429 Too Many Requests: {\"error\":\"slow down\"}"
        );
    }

    #[test]
    fn unexpected_status_truncation_respects_utf8_boundaries() {
        // Multi-byte characters straddling the cut must not panic.
        let body = "é".repeat(300);
        let err = RestError::unexpected_status(StatusCode::INTERNAL_SERVER_ERROR, body.as_bytes());
        assert!(err.to_string().ends_with("..."));
    }
}
