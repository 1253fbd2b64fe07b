// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

use crate::{
    error::RestError,
    response::Response,
    types::{
        AggregateReceipt, InferenceReceipt, RawInferenceReceipt, RawVerifyReceipt, TaskStatus,
        VerifyReceipt,
    },
    Result,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client as ReqwestClient, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use std::time::{Duration, Instant};
use url::Url;

pub const USER_AGENT: &str = concat!("scoria-request-emitter/", env!("CARGO_PKG_VERSION"));

/// Default value reported in the `X-GPU-ID` header, matching the hardware
/// profile the production fleet reports.
pub const DEFAULT_GPU_ID: &str = "Tesla-V100-PCIE-32GB";

const GPU_ID_HEADER: &str = "X-GPU-ID";

// Must exceed the privacy-aggregation latency threshold (30s) so slow
// aggregations surface as slow responses, not client-side timeouts.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(35);

/// Builder for [`Client`].
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: Url,
    api_key: Option<String>,
    gpu_id: String,
    timeout: Duration,
}

impl ClientBuilder {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            api_key: None,
            gpu_id: DEFAULT_GPU_ID.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn gpu_id(mut self, gpu_id: String) -> Self {
        self.gpu_id = gpu_id;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Client> {
        let mut headers = HeaderMap::new();
        headers.insert(
            GPU_ID_HEADER,
            HeaderValue::from_str(&self.gpu_id).map_err(|e| RestError::ApiKey(e.to_string()))?,
        );
        if let Some(key) = &self.api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| RestError::ApiKey(e.to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        let inner = ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;
        Ok(Client {
            base_url: self.base_url,
            inner,
        })
    }
}

/// A client for the Scoria REST API. Cheap to clone; clones share the
/// underlying connection pool.
#[derive(Clone, Debug)]
pub struct Client {
    base_url: Url,
    inner: ReqwestClient,
}

impl Client {
    pub fn builder(base_url: Url) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    pub fn new(base_url: Url) -> Result<Self> {
        ClientBuilder::new(base_url).build()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Submit an inference request. The API acknowledges asynchronous work
    /// with `202 Accepted` and a task id; any other status is an error, as is
    /// a 202 body without a task id.
    pub async fn submit_inference<B: Serialize>(
        &self,
        payload: &B,
    ) -> Result<Response<InferenceReceipt>> {
        let raw: Response<RawInferenceReceipt> = self
            .post_json(self.join_url("inference")?, payload, Some(StatusCode::ACCEPTED))
            .await?;
        match raw.inner().task_id.clone() {
            Some(task_id) => Ok(raw.map(|_| InferenceReceipt { task_id })),
            None => Err(RestError::MissingField("task_id")),
        }
    }

    /// Submit a transaction for on-chain verification. A response without a
    /// `signature` field means the verification was not actually performed.
    pub async fn blockchain_verify<B: Serialize>(
        &self,
        payload: &B,
    ) -> Result<Response<VerifyReceipt>> {
        let raw: Response<RawVerifyReceipt> = self
            .post_json(self.join_url("blockchain/verify")?, payload, None)
            .await?;
        match raw.inner().signature.clone() {
            Some(signature) => Ok(raw.map(|_| VerifyReceipt { signature })),
            None => Err(RestError::MissingField("signature")),
        }
    }

    /// Kick off a privacy aggregation over the given model hashes. Latency
    /// policy is the caller's business; the elapsed time is on the response.
    pub async fn privacy_aggregate<B: Serialize>(
        &self,
        payload: &B,
    ) -> Result<Response<AggregateReceipt>> {
        self.post_json(self.join_url("privacy/aggregate")?, payload, None)
            .await
    }

    /// Fetch the status of a previously submitted task.
    pub async fn get_task(&self, task_id: &str) -> Result<Response<TaskStatus>> {
        let url = self.join_url(&format!("tasks/{}", task_id))?;
        let start = Instant::now();
        let response = self.inner.get(url).send().await?;
        self.check_and_decode(response, start, None).await
    }

    /// Reachability probe used by cluster health checks. Any HTTP response,
    /// including an error status, proves the instance is up; only transport
    /// failures are reported.
    pub async fn probe(&self) -> Result<()> {
        self.inner.get(self.base_url.clone()).send().await?;
        Ok(())
    }

    /// Joins a relative path onto the base URL. `Url::join` would treat a
    /// base without a trailing slash as a file and drop its last segment, so
    /// segments are appended explicitly (which also path-encodes them).
    fn join_url(&self, path: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RestError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(path.split('/'));
        Ok(url)
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        url: Url,
        body: &B,
        expected_status: Option<StatusCode>,
    ) -> Result<Response<T>> {
        let start = Instant::now();
        let response = self.inner.post(url).json(body).send().await?;
        self.check_and_decode(response, start, expected_status).await
    }

    async fn check_and_decode<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        start: Instant,
        expected_status: Option<StatusCode>,
    ) -> Result<Response<T>> {
        let status = response.status();
        let bytes = response.bytes().await?;
        let elapsed = start.elapsed();
        let ok = match expected_status {
            Some(expected) => status == expected,
            None => status.is_success(),
        };
        if !ok {
            return Err(RestError::unexpected_status(status, &bytes));
        }
        let inner = serde_json::from_slice(&bytes).map_err(RestError::Decode)?;
        Ok(Response::new(inner, status, elapsed))
    }
}
