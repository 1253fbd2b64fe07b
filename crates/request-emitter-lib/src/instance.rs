// Copyright (c) Scoria Labs
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use scoria_rest_client::{Client, ClientBuilder};
use std::fmt;
use url::Url;

/// One target deployment of the Scoria API.
#[derive(Clone, Debug)]
pub struct Instance {
    peer_name: String,
    url: Url,
    api_key: Option<String>,
    gpu_id: String,
}

impl Instance {
    pub fn new(peer_name: String, url: Url, api_key: Option<String>, gpu_id: String) -> Self {
        Self {
            peer_name,
            url,
            api_key,
            gpu_id,
        }
    }

    pub fn peer_name(&self) -> &str {
        &self.peer_name
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn rest_client(&self) -> Result<Client> {
        Ok(ClientBuilder::new(self.url.clone())
            .api_key(self.api_key.clone())
            .gpu_id(self.gpu_id.clone())
            .build()?)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.peer_name)
    }
}
