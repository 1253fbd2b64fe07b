// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;
use std::time::Duration;

/// A deserialized response body together with the HTTP status and the wall
/// time the call took, measured from just before the request was sent until
/// the full body was read.
#[derive(Clone, Debug)]
pub struct Response<T> {
    inner: T,
    status: StatusCode,
    elapsed: Duration,
}

impl<T> Response<T> {
    pub(crate) fn new(inner: T, status: StatusCode, elapsed: Duration) -> Self {
        Self {
            inner,
            status,
            elapsed,
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Response<U> {
        Response {
            inner: f(self.inner),
            status: self.status,
            elapsed: self.elapsed,
        }
    }
}
