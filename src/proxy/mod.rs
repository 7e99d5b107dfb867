// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Forward-proxy listener
//!
//! Serves the proxy port with axum: a single fallback route catches every
//! method and path and hands the transaction to the engine. axum speaks
//! `http` 1.x while the upstream client speaks reqwest's `http` 0.2, so the
//! boundary converts via strings and bytes.

mod engine;

pub use engine::{ProxyEngine, DROP_BODY};

use std::net::SocketAddr;

use anyhow::Context;
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode as AxumStatusCode;
use axum::response::Response as AxumResponse;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::http::{Request, Response};
use crate::state::AppState;

/// Start the proxy listener, serving until `shutdown` fires
pub async fn start_proxy(state: AppState, shutdown: oneshot::Receiver<()>) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.proxy_port));
    let app = Router::new()
        .fallback(proxy_handler)
        .with_state(ProxyEngine::new(state));

    let listener = TcpListener::bind(addr)
        .await
        .context("failed to bind proxy listener")?;
    tracing::info!("proxy listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.await.ok();
    })
    .await
    .context("proxy server error")?;

    tracing::info!("proxy listener shut down");
    Ok(())
}

/// Catch-all proxy handler: every method, every path
async fn proxy_handler(
    State(engine): State<ProxyEngine>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: axum::extract::Request,
) -> AxumResponse {
    match into_proxied_request(req).await {
        Ok(request) => {
            let response = engine.handle(request, Some(addr.ip().to_string())).await;
            into_axum_response(response)
        }
        Err(e) => {
            tracing::debug!("rejected malformed proxy request: {}", e);
            plain_response(AxumStatusCode::BAD_REQUEST, format!("Proxy error: {}", e))
        }
    }
}

/// Convert an inbound axum request into the engine's representation.
///
/// A forward proxy receives absolute-form request lines; anything else
/// (including CONNECT's authority form) is rejected as malformed.
async fn into_proxied_request(req: axum::extract::Request) -> Result<Request> {
    let (parts, body) = req.into_parts();

    if parts.uri.scheme().is_none() || parts.uri.host().is_none() {
        return Err(Error::malformed(
            "proxy requests must carry an absolute request URI",
        ));
    }

    let method = reqwest::Method::from_bytes(parts.method.as_str().as_bytes())
        .map_err(|_| Error::malformed(format!("invalid method {:?}", parts.method.as_str())))?;

    let mut request =
        Request::new(method, parts.uri.to_string()).map_err(|e| Error::malformed(e.to_string()))?;
    request.http_version = version_str(parts.version).to_string();

    for (name, value) in parts.headers.iter() {
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::try_from(name.as_str()),
            reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            request.headers.append(name, value);
        }
    }

    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| Error::malformed(format!("failed to read request body: {}", e)))?;
    if !bytes.is_empty() {
        request.body = Some(bytes);
    }

    Ok(request)
}

/// Convert the engine's response back into an axum response. Hop-by-hop
/// and length headers are recomputed by the server.
fn into_axum_response(response: Response) -> AxumResponse {
    let mut builder = axum::http::Response::builder().status(response.status.as_u16());
    for (name, value) in response.headers.iter() {
        if matches!(
            name.as_str(),
            "connection" | "transfer-encoding" | "content-length"
        ) {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_bytes());
    }
    match builder.body(Body::from(response.body)) {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("failed to build client response: {}", e);
            plain_response(
                AxumStatusCode::INTERNAL_SERVER_ERROR,
                "Proxy error: response conversion failed".to_string(),
            )
        }
    }
}

fn plain_response(status: AxumStatusCode, body: String) -> AxumResponse {
    match axum::http::Response::builder()
        .status(status)
        .header("content-type", "text/plain")
        .body(Body::from(body))
    {
        Ok(response) => response,
        Err(_) => axum::http::Response::new(Body::empty()),
    }
}

fn version_str(version: axum::http::Version) -> &'static str {
    match version {
        axum::http::Version::HTTP_09 => "HTTP/0.9",
        axum::http::Version::HTTP_10 => "HTTP/1.0",
        axum::http::Version::HTTP_2 => "HTTP/2.0",
        axum::http::Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}
