// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Proxy configuration and layered value resolution
//!
//! `dashboard_url` and `callback_base` are resolved per key with the
//! precedence: CLI `--set key=value` > environment > `logs/config.json` >
//! hardcoded default. Ports and paths are plain CLI options.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

/// Environment variable for the dashboard base URL
pub const ENV_DASHBOARD_URL: &str = "SIEPPARI_DASHBOARD_URL";
/// Environment variable for the callback beacon base URL
pub const ENV_CALLBACK_BASE: &str = "SIEPPARI_CALLBACK_BASE";
/// Name of the optional on-disk config file inside the log directory
pub const CONFIG_FILE: &str = "config.json";

/// Proxy configuration
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Dashboard base URL, e.g. `http://10.0.0.5:6000`
    pub dashboard_url: String,
    /// Callback base for injected beacons, e.g. `http://10.0.0.5:5000/callback`
    pub callback_base: String,
    /// Proxy listener port
    pub proxy_port: u16,
    /// Dashboard (control-plane API) listener port
    pub dashboard_port: u16,
    /// Callback service listener port
    pub callback_port: u16,
    /// Directory for persisted state and logs
    pub log_dir: PathBuf,
    /// Timeout for upstream fetches
    pub upstream_timeout: Duration,
    /// Hard deadline for an operator decision on an intercepted flow
    pub decision_deadline: Duration,
    /// Accept invalid upstream TLS certificates
    pub accept_invalid_certs: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            dashboard_url: "http://127.0.0.1:6000".to_string(),
            callback_base: "http://127.0.0.1:5000/callback".to_string(),
            proxy_port: 8080,
            dashboard_port: 6000,
            callback_port: 5000,
            log_dir: PathBuf::from("logs"),
            upstream_timeout: Duration::from_secs(15),
            decision_deadline: Duration::from_secs(30),
            accept_invalid_certs: false,
        }
    }
}

/// Optional on-disk config file, written by the dashboard or by hand
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    dashboard_url: Option<String>,
    callback_base: Option<String>,
}

impl ConfigFile {
    fn load(log_dir: &Path) -> Self {
        std::fs::read_to_string(log_dir.join(CONFIG_FILE))
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default()
    }
}

impl ProxyConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the endpoint keys with full precedence: CLI override >
    /// environment > config file under `log_dir` > default.
    pub fn resolve(log_dir: &Path, overrides: &HashMap<String, String>) -> Self {
        let file = ConfigFile::load(log_dir);
        let defaults = Self::default();

        let dashboard_url = resolve_value(
            overrides.get("dashboard_url"),
            ENV_DASHBOARD_URL,
            file.dashboard_url.as_deref(),
            &defaults.dashboard_url,
        );
        let callback_base = resolve_value(
            overrides.get("callback_base"),
            ENV_CALLBACK_BASE,
            file.callback_base.as_deref(),
            &defaults.callback_base,
        );

        Self {
            dashboard_url,
            callback_base,
            log_dir: log_dir.to_path_buf(),
            ..defaults
        }
    }

    /// Set the proxy listener port
    pub fn proxy_port(mut self, port: u16) -> Self {
        self.proxy_port = port;
        self
    }

    /// Set the dashboard listener port
    pub fn dashboard_port(mut self, port: u16) -> Self {
        self.dashboard_port = port;
        self
    }

    /// Set the callback listener port
    pub fn callback_port(mut self, port: u16) -> Self {
        self.callback_port = port;
        self
    }

    /// Set the upstream fetch timeout
    pub fn upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    /// Set the operator decision deadline
    pub fn decision_deadline(mut self, deadline: Duration) -> Self {
        self.decision_deadline = deadline;
        self
    }

    /// Accept invalid upstream TLS certificates
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Hostname of the dashboard endpoint
    pub fn dashboard_host(&self) -> Option<String> {
        host_of(&self.dashboard_url)
    }

    /// Hostname of the callback endpoint
    pub fn callback_host(&self) -> Option<String> {
        host_of(&self.callback_base)
    }

    /// Whether `host` belongs to the proxy's own control plane.
    ///
    /// Requests to these hosts bypass interception and injection entirely so
    /// the proxy never loops back into itself.
    pub fn is_internal_host(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        if host == "localhost" || host == "127.0.0.1" {
            return true;
        }
        self.dashboard_host().as_deref() == Some(host.as_str())
            || self.callback_host().as_deref() == Some(host.as_str())
    }
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

fn resolve_value(
    cli: Option<&String>,
    env_name: &str,
    file: Option<&str>,
    default: &str,
) -> String {
    let value = if let Some(v) = cli {
        v.clone()
    } else if let Ok(v) = std::env::var(env_name) {
        v
    } else if let Some(v) = file {
        v.to_string()
    } else {
        default.to_string()
    };
    value.trim_end_matches('/').to_string()
}
