// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Proxied response representation

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;

use crate::error::{Error, Result};

/// Response returned to the proxy client, either fetched upstream or
/// synthesized by the proxy itself
#[derive(Debug, Clone)]
pub struct Response {
    /// Response status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Bytes,
    /// Upstream fetch time in milliseconds (zero for synthesized responses)
    pub response_time_ms: u64,
}

impl Response {
    /// Create a new response
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes, response_time_ms: u64) -> Self {
        Self {
            status,
            headers,
            body,
            response_time_ms,
        }
    }

    /// Synthesize a response locally, without contacting any upstream
    pub fn synthetic(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::try_from(content_type) {
            headers.insert("content-type", value);
        }
        Self {
            status,
            headers,
            body: body.into(),
            response_time_ms: 0,
        }
    }

    /// Get status code as u16
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Get a header value
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get content type
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Check if the content type is HTML or XHTML
    pub fn is_html(&self) -> bool {
        self.content_type()
            .map(|ct| {
                let ct = ct.to_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml+xml")
            })
            .unwrap_or(false)
    }

    /// Get body as text, failing on invalid UTF-8
    pub fn text(&self) -> Result<String> {
        std::str::from_utf8(&self.body)
            .map(|s| s.to_string())
            .map_err(|e| Error::injection(format!("response body is not UTF-8: {}", e)))
    }

    /// Get body as text, lossy conversion
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Replace the body
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Get body length
    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_response() {
        let resp = Response::synthetic(StatusCode::IM_A_TEAPOT, "text/plain", "dropped");
        assert_eq!(resp.status_code(), 418);
        assert_eq!(resp.content_type(), Some("text/plain"));
        assert_eq!(resp.text().unwrap(), "dropped");
    }

    #[test]
    fn test_is_html() {
        let html = Response::synthetic(StatusCode::OK, "text/html; charset=utf-8", "");
        let xhtml = Response::synthetic(StatusCode::OK, "application/xhtml+xml", "");
        let json = Response::synthetic(StatusCode::OK, "application/json", "");
        assert!(html.is_html());
        assert!(xhtml.is_html());
        assert!(!json.is_html());
    }

    #[test]
    fn test_text_rejects_invalid_utf8() {
        let mut resp = Response::synthetic(StatusCode::OK, "text/html", "");
        resp.set_body(vec![0xff, 0xfe, 0x00]);
        assert!(resp.text().is_err());
        assert!(!resp.text_lossy().is_empty());
    }
}
