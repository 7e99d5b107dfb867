// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! # Sieppari - Intercepting HTTP Proxy
//!
//! An intercepting HTTP proxy with an operator dashboard, built for manual
//! web-security testing. Point a browser at the proxy, pause interesting
//! flows, then forward, drop or modify them from the dashboard; optionally
//! tag flows so their HTML responses carry a correlating beacon.
//!
//! ## Features
//!
//! - **Interception**: pause live flows and hand them to an operator
//! - **Fail-open**: an undecided flow forwards after 30 s, never blocks
//! - **Modification**: rewrite method, URL, headers and body per flow
//! - **Beacon injection**: rewrite HTML responses to emit out-of-band
//!   callbacks keyed by an opaque injection id
//! - **Correlation**: every beacon hit is logged and linked back to the
//!   originating request
//! - **Interop**: state files (`callbacks.json`, `injected.json`) are plain
//!   JSON readable by external tooling
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::path::Path;
//!
//! use sieppari::{AppState, ProxyConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ProxyConfig::resolve(Path::new("logs"), &HashMap::new());
//!     let state = AppState::new(config)?;
//!
//!     let (_shutdown, rx) = tokio::sync::oneshot::channel();
//!     sieppari::proxy::start_proxy(state, rx).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod callback;
pub mod config;
pub mod error;
pub mod http;
pub mod inject;
pub mod intercept;
pub mod proxy;
pub mod reqlog;
pub mod state;

// Re-exports for convenience
pub use callback::{CallbackHit, CallbackStore, Injection};
pub use config::ProxyConfig;
pub use error::{Error, Result};
pub use http::{Request, Response, UpstreamClient};
pub use intercept::{
    Decision, DecisionKind, Flow, FlowBody, FlowData, InterceptBroker, InterceptToggle,
    Modification,
};
pub use proxy::ProxyEngine;
pub use reqlog::RequestLog;
pub use state::AppState;
