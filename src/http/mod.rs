// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP layer for the Sieppari proxy
//!
//! Internal request/response representation of one proxied transaction and
//! the upstream client used to forward it.

mod client;
mod request;
mod response;

pub use client::{UpstreamClient, UpstreamClientConfig};
pub use request::Request;
pub use response::Response;

/// Marker and trigger headers
pub mod headers {
    /// Client-supplied trigger: mark the request for beacon injection
    pub const X_INJECT_PAYLOAD: &str = "x-inject-payload";
    /// Client-supplied trigger: intercept this request
    pub const X_INTERCEPT: &str = "x-intercept";
    /// Internal marker carrying the injection id into the response phase.
    /// Stripped on ingress; only the proxy itself may set it.
    pub const X_INJECTION_ID: &str = "x-injection-id";

    pub const CONTENT_TYPE: &str = "content-type";
    pub const USER_AGENT: &str = "user-agent";
}

/// Headers that must not be forwarded between the client and upstream legs
pub const HOP_BY_HOP: &[&str] = &[
    "host",
    "connection",
    "proxy-connection",
    "keep-alive",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
    "content-length",
];
