// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Beacon hit and injection record types

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current time as seconds since the epoch, the timestamp convention of
/// every persisted record
pub fn epoch_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// One hit on the callback endpoint. Appended on arrival, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackHit {
    /// Arrival time, seconds since the epoch
    pub time: f64,
    /// Remote address of the caller
    #[serde(default)]
    pub remote_addr: Option<String>,
    /// HTTP method of the beacon request
    pub method: String,
    /// Query arguments
    #[serde(default)]
    pub args: HashMap<String, String>,
    /// Request headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// JSON body, when the beacon POSTed one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<serde_json::Value>,
    /// Injection this hit correlates to, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub injection_id: Option<String>,
}

impl CallbackHit {
    /// Create a hit stamped with the current time
    pub fn new(method: impl Into<String>, remote_addr: Option<String>) -> Self {
        Self {
            time: epoch_seconds(),
            remote_addr,
            method: method.into(),
            args: HashMap::new(),
            headers: HashMap::new(),
            json: None,
            injection_id: None,
        }
    }

    /// Set the query arguments
    pub fn args(mut self, args: HashMap<String, String>) -> Self {
        self.args = args;
        self
    }

    /// Set the request headers
    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Attach a JSON body
    pub fn json(mut self, json: serde_json::Value) -> Self {
        self.json = Some(json);
        self
    }

    /// The injection id carried by this hit: the `id` query argument, or
    /// an `id` field in the JSON body
    pub fn carried_injection_id(&self) -> Option<String> {
        if let Some(id) = self.args.get("id") {
            return Some(id.clone());
        }
        self.json
            .as_ref()
            .and_then(|json| json.get("id"))
            .and_then(|id| id.as_str())
            .map(|id| id.to_string())
    }
}

/// Record that a request was marked for a beacon-embedding rewrite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Injection {
    /// Marking time, seconds since the epoch
    pub time: f64,
    /// Method of the origin request
    pub method: String,
    /// URL of the origin request
    pub url: String,
    /// Client that sent the origin request
    #[serde(default)]
    pub client_ip: Option<String>,
    /// User agent of the origin request
    #[serde(default)]
    pub user_agent: String,
    /// Whether the response rewrite succeeded
    pub injected: bool,
    /// Rewrite time, set when `injected` flips to true
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub injected_at: Option<f64>,
    /// Correlated beacon callbacks, in arrival order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub callbacks: Vec<InjectionCallback>,
}

impl Injection {
    /// Create a not-yet-injected record stamped with the current time
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        client_ip: Option<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            time: epoch_seconds(),
            method: method.into(),
            url: url.into(),
            client_ip,
            user_agent: user_agent.into(),
            injected: false,
            injected_at: None,
            callbacks: Vec::new(),
        }
    }
}

/// One correlated callback entry inside an injection record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectionCallback {
    pub time: f64,
    #[serde(default)]
    pub remote_addr: Option<String>,
    #[serde(default)]
    pub args: HashMap<String, String>,
}
