// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Control-plane HTTP API
//!
//! Two small JSON surfaces: the dashboard listener carrying the intercept
//! endpoints (`/ui/...`, `/cli/...`) and the callback listener that third
//! parties' beacons hit. Endpoint errors surface as a status code with a
//! `{"error": ...}` body; beacon endpoints always answer 204 quickly.

mod callbacks;
mod intercept;

use std::net::SocketAddr;

use anyhow::Context;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::error::Error;
use crate::state::AppState;

/// Assemble the dashboard (control-plane) router
pub fn dashboard_router(state: AppState) -> Router {
    Router::new()
        .route("/ui/intercept/status", get(intercept::status))
        .route("/ui/intercept/toggle", post(intercept::toggle))
        .route("/ui/intercept/list", get(intercept::list))
        .route("/cli/intercept/new", post(intercept::submit))
        .route(
            "/cli/intercept/decision",
            get(intercept::poll_decision).post(intercept::post_decision),
        )
        .route("/ui/callbacks", get(callbacks::list))
        .route("/ui/callbacks/clear", post(callbacks::clear))
        .route("/ui/hit", get(callbacks::hit).post(callbacks::hit))
        .with_state(state)
}

/// Assemble the callback-service router
pub fn callback_router(state: AppState) -> Router {
    Router::new()
        .route("/callback", get(callbacks::hit).post(callbacks::hit))
        .with_state(state)
}

/// Start the dashboard listener, serving until `shutdown` fires
pub async fn start_dashboard(
    state: AppState,
    shutdown: oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.dashboard_port));
    serve("dashboard", addr, dashboard_router(state), shutdown).await
}

/// Start the callback listener, serving until `shutdown` fires
pub async fn start_callback(
    state: AppState,
    shutdown: oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.callback_port));
    serve("callback", addr, callback_router(state), shutdown).await
}

async fn serve(
    name: &'static str,
    addr: SocketAddr,
    app: Router,
    shutdown: oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {} listener", name))?;
    tracing::info!("{} listening on {}", name, addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.await.ok();
    })
    .await
    .with_context(|| format!("{} server error", name))?;

    tracing::info!("{} listener shut down", name);
    Ok(())
}

/// API error responses, converted to a status code plus `{"error": ...}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        tracing::debug!("API error: {} - {}", status, message);

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        match error {
            Error::InvalidDecision(msg) | Error::MalformedRequest(msg) => {
                ApiError::BadRequest(msg)
            }
            Error::UnknownFlow(id) => ApiError::NotFound(format!("unknown flow: {}", id)),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
