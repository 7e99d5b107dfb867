// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Shared state wired through every listener
//!
//! One instance per process, cloned into the proxy engine and the API
//! handlers. All coordination structures are `Arc`-shared; cloning is
//! cheap.

use std::sync::Arc;

use crate::callback::CallbackStore;
use crate::config::ProxyConfig;
use crate::error::Result;
use crate::http::{UpstreamClient, UpstreamClientConfig};
use crate::intercept::{InterceptBroker, InterceptToggle, STATE_FILE};
use crate::reqlog::RequestLog;

/// Shared state for the proxy, dashboard and callback listeners
#[derive(Clone)]
pub struct AppState {
    /// Resolved configuration
    pub config: ProxyConfig,
    /// Client for upstream forwarding
    pub client: UpstreamClient,
    /// Rendezvous between proxy workers and operators
    pub broker: Arc<InterceptBroker>,
    /// Process-wide intercept switch
    pub toggle: Arc<InterceptToggle>,
    /// Beacon hits and injection index
    pub callbacks: Arc<CallbackStore>,
    /// Plain-text request log
    pub reqlog: Arc<RequestLog>,
}

impl AppState {
    /// Build the process state, creating the log directory and loading any
    /// persisted toggle and store state
    pub fn new(config: ProxyConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.log_dir)?;

        let client = UpstreamClient::with_config(UpstreamClientConfig {
            timeout: config.upstream_timeout,
            accept_invalid_certs: config.accept_invalid_certs,
        })?;
        let toggle = Arc::new(InterceptToggle::with_state_file(
            config.log_dir.join(STATE_FILE),
        ));
        let callbacks = Arc::new(CallbackStore::open(&config.log_dir)?);
        let reqlog = Arc::new(RequestLog::new(&config.log_dir));

        Ok(Self {
            config,
            client,
            broker: Arc::new(InterceptBroker::new()),
            toggle,
            callbacks,
            reqlog,
        })
    }
}
