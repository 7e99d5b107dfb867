// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Per-request proxy pipeline
//!
//! For each transaction the engine decides, in order: control-plane bypass,
//! injection marking, interception, then forwarding. The response phase
//! rewrites HTML bodies of marked flows. Every internal failure recovers to
//! forwarding; the client transaction always completes.

use reqwest::StatusCode;
use uuid::Uuid;

use crate::callback::{epoch_seconds, Injection};
use crate::http::{headers, Request, Response};
use crate::inject;
use crate::intercept::{DecisionKind, Flow, FlowData};
use crate::state::AppState;

/// Body of the synthesized response for dropped flows
pub const DROP_BODY: &str = "Intercepted and dropped by operator";

/// What the intercept protocol decided to do with a request
enum InterceptOutcome {
    /// Continue upstream with this (possibly modified) request
    Proceed(Request),
    /// Answer the client directly, upstream is never contacted
    Respond(Response),
}

/// The proxy engine: one per process, cloned into each worker
#[derive(Clone)]
pub struct ProxyEngine {
    state: AppState,
}

impl ProxyEngine {
    /// Create an engine over the shared state
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Run one transaction through the full pipeline.
    ///
    /// Always yields a response: upstream failures become 502, intercept
    /// faults fail open, injection errors are swallowed.
    pub async fn handle(&self, request: Request, client_addr: Option<String>) -> Response {
        let method = request.method.to_string();
        let url = request.url_str().to_string();

        self.state.reqlog.request(
            &method,
            &url,
            request.header_str(headers::USER_AGENT).unwrap_or(""),
            client_addr.as_deref().unwrap_or("-"),
        );

        let response = self.process(request, client_addr).await;

        self.state.reqlog.response(
            &method,
            &url,
            response.status_code(),
            response.content_type().unwrap_or(""),
        );
        response
    }

    async fn process(&self, mut request: Request, client_addr: Option<String>) -> Response {
        // the marker is trusted precisely because clients cannot supply it
        request.remove_header(headers::X_INJECTION_ID);

        let internal = request
            .host()
            .map(|host| self.state.config.is_internal_host(host))
            .unwrap_or(false);
        if internal {
            return self.forward(request).await;
        }

        if wants_inject(&request) {
            self.mark_for_injection(&mut request, client_addr.as_deref());
        }

        let request = if self.intercept_requested(&request) {
            match self.intercept(request, client_addr).await {
                InterceptOutcome::Proceed(request) => request,
                InterceptOutcome::Respond(response) => return response,
            }
        } else {
            request
        };

        self.forward_and_inject(request).await
    }

    /// Engage the intercept protocol: snapshot, submit, await the operator
    async fn intercept(&self, request: Request, client_addr: Option<String>) -> InterceptOutcome {
        let flow_id = Uuid::new_v4().to_string();
        let flow = Flow::new(&flow_id, FlowData::from_request(&request, client_addr));
        self.state.broker.submit(flow);
        tracing::debug!(%flow_id, url = request.url_str(), "flow paused, awaiting decision");

        let decision = self
            .state
            .broker
            .wait_decision(&flow_id, self.state.config.decision_deadline)
            .await;

        match decision.kind {
            DecisionKind::Forward => InterceptOutcome::Proceed(request),
            DecisionKind::Drop => {
                tracing::info!(%flow_id, url = request.url_str(), "flow dropped by operator");
                InterceptOutcome::Respond(Response::synthetic(
                    StatusCode::IM_A_TEAPOT,
                    "text/plain",
                    DROP_BODY,
                ))
            }
            DecisionKind::Modify => {
                let modification = decision.modified.unwrap_or_default();
                match modification.apply(request.clone()) {
                    Ok(modified) => {
                        tracing::info!(%flow_id, url = modified.url_str(), "flow modified by operator");
                        InterceptOutcome::Proceed(modified)
                    }
                    Err(e) => {
                        tracing::warn!(%flow_id, "modification rejected, forwarding unchanged: {}", e);
                        InterceptOutcome::Proceed(request)
                    }
                }
            }
        }
    }

    async fn forward_and_inject(&self, request: Request) -> Response {
        let injection_id = request
            .header_str(headers::X_INJECTION_ID)
            .map(str::to_string);

        let mut response = self.forward(request).await;

        if let Some(id) = injection_id {
            self.inject_response(&id, &mut response);
        }
        response
    }

    async fn forward(&self, request: Request) -> Response {
        let url = request.url_str().to_string();
        match self.state.client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%url, "upstream fetch failed: {}", e);
                Response::synthetic(
                    StatusCode::BAD_GATEWAY,
                    "text/plain",
                    format!("Proxy error: upstream unreachable: {}", e),
                )
            }
        }
    }

    /// Allocate an injection id, record it, stamp the marker header
    fn mark_for_injection(&self, request: &mut Request, client_addr: Option<&str>) {
        let id = Uuid::new_v4().to_string();
        let injection = Injection::new(
            request.method.to_string(),
            request.url_str(),
            client_addr.map(str::to_string),
            request.header_str(headers::USER_AGENT).unwrap_or(""),
        );
        if let Err(e) = self.state.callbacks.register_injection(&id, injection) {
            tracing::warn!("failed to register injection: {}", e);
            return;
        }
        request.set_header(headers::X_INJECTION_ID, &id);
        tracing::info!(injection_id = %id, url = request.url_str(), "marked flow for injection");
    }

    /// Rewrite an HTML response body to carry the beacon. Non-HTML bodies
    /// and decode failures pass through byte-exact.
    fn inject_response(&self, injection_id: &str, response: &mut Response) {
        if !response.is_html() {
            return;
        }
        match response.text() {
            Ok(body) => {
                let snippet =
                    inject::beacon_snippet(&self.state.config.callback_base, injection_id);
                response.set_body(inject::inject_into_html(&body, &snippet));
                self.state
                    .callbacks
                    .mark_injected(injection_id, epoch_seconds());
                tracing::info!(injection_id, "injected beacon into response");
            }
            Err(e) => tracing::warn!(injection_id, "injection skipped: {}", e),
        }
    }

    fn intercept_requested(&self, request: &Request) -> bool {
        self.state.toggle.enabled()
            || header_flag(request, headers::X_INTERCEPT)
            || query_flag(request, "intercept")
    }
}

/// Whether the request asks for beacon injection
fn wants_inject(request: &Request) -> bool {
    header_flag(request, headers::X_INJECT_PAYLOAD) || query_flag(request, "inject")
}

fn truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn header_flag(request: &Request, name: &str) -> bool {
    request.header_str(name).map(truthy).unwrap_or(false)
}

fn query_flag(request: &Request, key: &str) -> bool {
    request
        .query_param(key)
        .as_deref()
        .map(truthy)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;
    use crate::intercept::{Decision, Modification};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn engine_with(dir: &std::path::Path) -> ProxyEngine {
        let config = ProxyConfig {
            log_dir: dir.to_path_buf(),
            decision_deadline: Duration::from_millis(300),
            ..Default::default()
        };
        ProxyEngine::new(AppState::new(config).unwrap())
    }

    #[test]
    fn test_trigger_flags() {
        let req = Request::get("http://example.com/?inject=TRUE").unwrap();
        assert!(wants_inject(&req));

        let req = Request::get("http://example.com/")
            .unwrap()
            .header("X-Inject-Payload", "yes");
        assert!(wants_inject(&req));

        let req = Request::get("http://example.com/?inject=0").unwrap();
        assert!(!wants_inject(&req));
    }

    #[tokio::test]
    async fn test_forward_path_is_untouched() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_string(r#"{"ok":true}"#),
            )
            .mount(&upstream)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(dir.path());

        let request = Request::get(format!("{}/get", upstream.uri())).unwrap();
        let response = engine.handle(request, Some("10.0.0.9".to_string())).await;

        assert_eq!(response.status_code(), 200);
        assert_eq!(response.text().unwrap(), r#"{"ok":true}"#);
        assert!(engine.state.broker.is_empty());
    }

    #[tokio::test]
    async fn test_drop_decision_synthesizes_teapot() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(dir.path());
        engine.state.toggle.set(true);

        let broker = Arc::clone(&engine.state.broker);
        tokio::spawn(async move {
            loop {
                if let Some(flow) = broker.list_pending().into_iter().next() {
                    broker.decide(&flow.flow_id, Decision::drop()).unwrap();
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let request = Request::get("http://unreachable.invalid/").unwrap();
        let outcome = engine.intercept(request, None).await;
        match outcome {
            InterceptOutcome::Respond(response) => {
                assert_eq!(response.status_code(), 418);
                assert_eq!(response.content_type(), Some("text/plain"));
                assert_eq!(response.text().unwrap(), DROP_BODY);
            }
            InterceptOutcome::Proceed(_) => panic!("dropped flow must not go upstream"),
        }
        assert!(engine.state.broker.is_empty());
    }

    #[tokio::test]
    async fn test_modify_decision_rewrites_request() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(dir.path());

        let broker = Arc::clone(&engine.state.broker);
        tokio::spawn(async move {
            loop {
                if let Some(flow) = broker.list_pending().into_iter().next() {
                    let modification = Modification {
                        method: Some("PUT".to_string()),
                        url: Some("http://example.com/b".to_string()),
                        headers: Some(HashMap::from([("x-bar".to_string(), "2".to_string())])),
                        body: Some(Some("world".to_string())),
                    };
                    broker
                        .decide(&flow.flow_id, Decision::modify(modification))
                        .unwrap();
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let request = Request::post("http://example.com/a")
            .unwrap()
            .header("x-foo", "1")
            .body("hello");
        let outcome = engine.intercept(request, None).await;
        match outcome {
            InterceptOutcome::Proceed(modified) => {
                assert_eq!(modified.method.as_str(), "PUT");
                assert_eq!(modified.url_str(), "http://example.com/b");
                assert!(modified.header_str("x-foo").is_none());
                assert_eq!(modified.header_str("x-bar"), Some("2"));
                assert_eq!(modified.body.as_deref(), Some(&b"world"[..]));
            }
            InterceptOutcome::Respond(_) => panic!("modify must proceed upstream"),
        }
    }

    #[tokio::test]
    async fn test_undecided_flow_times_out_to_forward() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(dir.path());

        let request = Request::get("http://example.com/slow").unwrap();
        let outcome = engine.intercept(request, None).await;
        match outcome {
            InterceptOutcome::Proceed(request) => {
                assert_eq!(request.url_str(), "http://example.com/slow")
            }
            InterceptOutcome::Respond(_) => panic!("timeout must fail open"),
        }
        assert!(engine.state.broker.list_pending().is_empty());
    }

    #[tokio::test]
    async fn test_injection_round_trip() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(query_param("inject", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html><body>hi</body></html>"),
            )
            .mount(&upstream)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(dir.path());

        let mut request = Request::get(format!("{}/page?inject=1", upstream.uri())).unwrap();
        assert!(wants_inject(&request));
        engine.mark_for_injection(&mut request, Some("10.0.0.9"));
        let id = request
            .header_str(headers::X_INJECTION_ID)
            .unwrap()
            .to_string();

        let response = engine.forward_and_inject(request).await;
        let body = response.text().unwrap();
        let snippet = inject::beacon_snippet(&engine.state.config.callback_base, &id);
        assert_eq!(body, format!("<html><body>hi{}</body></html>", snippet));

        let injection = engine.state.callbacks.injection(&id).unwrap();
        assert!(injection.injected);
        assert!(injection.injected_at.unwrap() >= injection.time);
    }

    #[tokio::test]
    async fn test_non_html_response_passes_byte_exact() {
        let payload: &[u8] = &[0x89, 0x50, 0x4e, 0x47, 0xff];
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(payload),
            )
            .mount(&upstream)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(dir.path());

        let mut request = Request::get(format!("{}/img", upstream.uri())).unwrap();
        engine.mark_for_injection(&mut request, None);
        let id = request
            .header_str(headers::X_INJECTION_ID)
            .unwrap()
            .to_string();

        let response = engine.forward_and_inject(request).await;
        assert_eq!(&response.body[..], payload);
        assert!(!engine.state.callbacks.injection(&id).unwrap().injected);
    }

    #[tokio::test]
    async fn test_internal_hosts_bypass_inject_and_intercept() {
        // wiremock binds 127.0.0.1, which is always an internal host:
        // even with the toggle on and inject=1 the request passes through
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ui"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<body>panel</body>"),
            )
            .mount(&upstream)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(dir.path());
        engine.state.toggle.set(true);

        let request = Request::get(format!("{}/ui?inject=1", upstream.uri())).unwrap();
        let response = engine.handle(request, None).await;

        assert_eq!(response.text().unwrap(), "<body>panel</body>");
        assert!(engine.state.broker.is_empty());
        assert!(engine.state.callbacks.list_injections().is_empty());
    }

    #[tokio::test]
    async fn test_inbound_marker_header_is_stripped() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<body>x</body>"),
            )
            .mount(&upstream)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(dir.path());

        // a forged marker must not cause a rewrite
        let request = Request::get(format!("{}/", upstream.uri()))
            .unwrap()
            .header("X-Injection-Id", "forged-id");
        let response = engine.handle(request, None).await;

        assert_eq!(response.text().unwrap(), "<body>x</body>");
        assert!(engine.state.callbacks.injection("forged-id").is_none());
    }

    #[tokio::test]
    async fn test_upstream_failure_becomes_bad_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(dir.path());

        // TEST-NET-1: connection refused immediately, but host is external
        let request = Request::get("http://192.0.2.1:9/")
            .unwrap()
            .timeout(Duration::from_millis(500));
        let response = engine.handle(request, None).await;

        assert_eq!(response.status_code(), 502);
        assert!(response.text().unwrap().starts_with("Proxy error"));
    }

    #[tokio::test]
    async fn test_modified_request_reaches_upstream() {
        let upstream = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/b"))
            .and(header("x-bar", "2"))
            .and(body_string("world"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&upstream)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(dir.path());

        let modification = Modification {
            method: Some("PUT".to_string()),
            url: Some(format!("{}/b", upstream.uri())),
            headers: Some(HashMap::from([("x-bar".to_string(), "2".to_string())])),
            body: Some(Some("world".to_string())),
        };
        let request = Request::post("http://example.com/a")
            .unwrap()
            .header("x-foo", "1")
            .body("hello");
        let modified = modification.apply(request).unwrap();

        let response = engine.forward(modified).await;
        assert_eq!(response.status_code(), 204);
    }
}
