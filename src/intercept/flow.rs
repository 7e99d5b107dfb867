// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Flow snapshots, operator decisions and request modifications

use std::collections::HashMap;

use bytes::Bytes;
use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::callback::epoch_seconds;
use crate::error::{Error, Result};
use crate::http::Request;

/// A paused HTTP request awaiting an operator decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    /// Opaque, globally unique flow identifier
    pub flow_id: String,
    /// Request snapshot shown to the operator
    pub data: FlowData,
    /// Creation time, seconds since the epoch
    #[serde(default = "epoch_seconds")]
    pub created: f64,
}

impl Flow {
    /// Create a new flow snapshot, stamped with the current time
    pub fn new(flow_id: impl Into<String>, data: FlowData) -> Self {
        Self {
            flow_id: flow_id.into(),
            data,
            created: epoch_seconds(),
        }
    }
}

/// Request fields captured when a flow is paused.
///
/// The snapshot is immutable: operators edit a candidate [`Modification`]
/// and submit it with their decision, the stored snapshot is never
/// rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowData {
    pub method: String,
    pub url: String,
    pub path: String,
    pub http_version: String,
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<FlowBody>,
    #[serde(default)]
    pub client_addr: Option<String>,
}

impl FlowData {
    /// Snapshot an in-flight request
    pub fn from_request(request: &Request, client_addr: Option<String>) -> Self {
        Self {
            method: request.method.to_string(),
            url: request.url_str().to_string(),
            path: request.path_and_query(),
            http_version: request.http_version.clone(),
            headers: request.header_map(),
            body: request
                .body
                .as_deref()
                .and_then(FlowBody::capture),
            client_addr,
        }
    }
}

/// Captured request body: text when it decodes as UTF-8, raw bytes
/// otherwise
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlowBody {
    Text(String),
    Bytes(Vec<u8>),
}

impl FlowBody {
    /// Capture a body, preferring text. Empty bodies capture as `None`.
    pub fn capture(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() {
            return None;
        }
        Some(match std::str::from_utf8(bytes) {
            Ok(text) => FlowBody::Text(text.to_string()),
            Err(_) => FlowBody::Bytes(bytes.to_vec()),
        })
    }

    /// Text view of the body, if it decoded
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FlowBody::Text(text) => Some(text),
            FlowBody::Bytes(_) => None,
        }
    }
}

/// Operator verdict kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Forward,
    Drop,
    Modify,
}

impl DecisionKind {
    /// Parse a wire value, rejecting anything outside the allowed kinds
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "forward" => Ok(DecisionKind::Forward),
            "drop" => Ok(DecisionKind::Drop),
            "modify" => Ok(DecisionKind::Modify),
            other => Err(Error::invalid_decision(format!(
                "decision must be forward, drop or modify, got {:?}",
                other
            ))),
        }
    }

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::Forward => "forward",
            DecisionKind::Drop => "drop",
            DecisionKind::Modify => "modify",
        }
    }
}

/// Operator decision on a flow, consumed exactly once by the submitter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub kind: DecisionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<Modification>,
}

impl Decision {
    /// Forward the request unchanged
    pub fn forward() -> Self {
        Self {
            kind: DecisionKind::Forward,
            modified: None,
        }
    }

    /// Drop the request without contacting upstream
    pub fn drop() -> Self {
        Self {
            kind: DecisionKind::Drop,
            modified: None,
        }
    }

    /// Modify the request, then forward it
    pub fn modify(modification: Modification) -> Self {
        Self {
            kind: DecisionKind::Modify,
            modified: Some(modification),
        }
    }
}

/// Request edits attached to a `modify` decision.
///
/// Every present field overrides the corresponding request field. A header
/// mapping replaces all headers. A body of JSON `null` empties the body;
/// an absent body leaves it unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Modification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(
        default,
        deserialize_with = "tri_state_body",
        skip_serializing_if = "Option::is_none"
    )]
    pub body: Option<Option<String>>,
}

/// Distinguishes an absent `body` field (outer `None`, keep the request
/// body) from an explicit `"body": null` (inner `None`, empty the body).
fn tri_state_body<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl Modification {
    /// Whether any field is present
    pub fn is_empty(&self) -> bool {
        self.method.is_none() && self.url.is_none() && self.headers.is_none() && self.body.is_none()
    }

    /// Validate the replacement fields without applying them
    pub fn validate(&self) -> Result<()> {
        if let Some(method) = &self.method {
            Method::from_bytes(method.as_bytes())
                .map_err(|_| Error::invalid_decision(format!("invalid method {:?}", method)))?;
        }
        if let Some(url) = &self.url {
            Url::parse(url)
                .map_err(|e| Error::invalid_decision(format!("invalid url {:?}: {}", url, e)))?;
        }
        Ok(())
    }

    /// Apply the edits to a request, producing the request that goes
    /// upstream
    pub fn apply(&self, mut request: Request) -> Result<Request> {
        if let Some(method) = &self.method {
            request.method = Method::from_bytes(method.as_bytes())
                .map_err(|_| Error::invalid_decision(format!("invalid method {:?}", method)))?;
        }
        if let Some(url) = &self.url {
            request.url = Url::parse(url)
                .map_err(|e| Error::invalid_decision(format!("invalid url {:?}: {}", url, e)))?;
        }
        if let Some(headers) = &self.headers {
            request.replace_headers(headers);
        }
        if let Some(body) = &self.body {
            request.body = Some(match body {
                Some(text) => Bytes::from(text.clone()),
                None => Bytes::new(),
            });
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_wire_shape() {
        let json = r#"{
            "flow_id": "f-1",
            "data": {
                "method": "GET",
                "url": "http://example.com/a?x=1",
                "path": "/a?x=1",
                "http_version": "HTTP/1.1",
                "headers": {"host": "example.com"},
                "body": null,
                "client_addr": "10.0.0.9"
            }
        }"#;
        let flow: Flow = serde_json::from_str(json).unwrap();
        assert_eq!(flow.flow_id, "f-1");
        assert_eq!(flow.data.method, "GET");
        assert!(flow.data.body.is_none());
        assert!(flow.created > 0.0);
    }

    #[test]
    fn test_flow_body_capture() {
        assert!(FlowBody::capture(b"").is_none());
        match FlowBody::capture(b"hello").unwrap() {
            FlowBody::Text(t) => assert_eq!(t, "hello"),
            FlowBody::Bytes(_) => panic!("utf-8 body must capture as text"),
        }
        match FlowBody::capture(&[0xff, 0xfe]).unwrap() {
            FlowBody::Bytes(b) => assert_eq!(b, vec![0xff, 0xfe]),
            FlowBody::Text(_) => panic!("binary body must capture as bytes"),
        }
    }

    #[test]
    fn test_decision_kind_parsing() {
        assert_eq!(DecisionKind::parse("drop").unwrap(), DecisionKind::Drop);
        assert!(DecisionKind::parse("explode").is_err());
        assert!(DecisionKind::parse("Forward").is_err());
    }

    #[test]
    fn test_modification_body_tri_state() {
        let absent: Modification = serde_json::from_str("{}").unwrap();
        assert!(absent.body.is_none());
        assert!(absent.is_empty());

        let null: Modification = serde_json::from_str(r#"{"body": null}"#).unwrap();
        assert_eq!(null.body, Some(None));

        let text: Modification = serde_json::from_str(r#"{"body": "world"}"#).unwrap();
        assert_eq!(text.body, Some(Some("world".to_string())));
    }

    #[test]
    fn test_modification_apply_overrides() {
        let request = Request::post("http://example.com/a")
            .unwrap()
            .header("x-foo", "1")
            .body("hello");

        let modification = Modification {
            method: Some("PUT".to_string()),
            url: Some("http://example.com/b".to_string()),
            headers: Some(HashMap::from([("x-bar".to_string(), "2".to_string())])),
            body: Some(Some("world".to_string())),
        };

        let modified = modification.apply(request).unwrap();
        assert_eq!(modified.method, Method::PUT);
        assert_eq!(modified.url_str(), "http://example.com/b");
        assert!(modified.header_str("x-foo").is_none());
        assert_eq!(modified.header_str("x-bar"), Some("2"));
        assert_eq!(modified.body.as_deref(), Some(&b"world"[..]));
    }

    #[test]
    fn test_modification_empty_is_noop() {
        let request = Request::get("http://example.com/a")
            .unwrap()
            .header("x-foo", "1");

        let modified = Modification::default().apply(request).unwrap();
        assert_eq!(modified.url_str(), "http://example.com/a");
        assert_eq!(modified.header_str("x-foo"), Some("1"));
        assert!(modified.body.is_none());
    }

    #[test]
    fn test_modification_null_body_empties() {
        let request = Request::post("http://example.com/a").unwrap().body("hello");
        let modification: Modification = serde_json::from_str(r#"{"body": null}"#).unwrap();
        let modified = modification.apply(request).unwrap();
        assert_eq!(modified.body.as_deref(), Some(&b""[..]));
    }

    #[test]
    fn test_modification_rejects_invalid_url() {
        let modification = Modification {
            url: Some("not a url".to_string()),
            ..Default::default()
        };
        assert!(modification.validate().is_err());
    }
}
