// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Upstream HTTP client

use std::time::{Duration, Instant};

use reqwest::redirect::Policy;
use reqwest::Client;

use super::{Request, Response, HOP_BY_HOP};
use crate::error::Result;

/// Upstream client configuration
#[derive(Debug, Clone)]
pub struct UpstreamClientConfig {
    /// Default timeout for upstream fetches
    pub timeout: Duration,
    /// Accept invalid certificates (dangerous!)
    pub accept_invalid_certs: bool,
}

impl Default for UpstreamClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            accept_invalid_certs: false,
        }
    }
}

/// Client used to forward proxied requests upstream.
///
/// Redirects are never followed: the browser behind the proxy must see 3xx
/// responses itself.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    config: UpstreamClientConfig,
}

impl UpstreamClient {
    /// Create a new upstream client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(UpstreamClientConfig::default())
    }

    /// Create a new upstream client with custom configuration
    pub fn with_config(config: UpstreamClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(Policy::none())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self { client, config })
    }

    /// Forward a request upstream and collect the full response.
    ///
    /// Hop-by-hop headers are stripped; everything else passes through
    /// verbatim.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let start = Instant::now();

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());

        for (name, value) in request.headers.iter() {
            if HOP_BY_HOP.contains(&name.as_str()) {
                continue;
            }
            builder = builder.header(name, value);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        let response_time_ms = start.elapsed().as_millis() as u64;

        Ok(Response::new(status, headers, body, response_time_ms))
    }

    /// Get client configuration
    pub fn config(&self) -> &UpstreamClientConfig {
        &self.config
    }
}
