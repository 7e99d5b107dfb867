// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Callback endpoints: beacon ingestion and the hit log

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::Json;
use serde_json::{json, Value};

use crate::callback::CallbackHit;
use crate::state::AppState;

/// GET /ui/callbacks
pub(super) async fn list(State(state): State<AppState>) -> Json<Vec<CallbackHit>> {
    Json(state.callbacks.list_hits())
}

/// POST /ui/callbacks/clear
pub(super) async fn clear(State(state): State<AppState>) -> Json<Value> {
    state.callbacks.clear_hits();
    Json(json!({ "status": "cleared" }))
}

/// GET/POST /callback and /ui/hit
///
/// Records the hit best-effort and answers immediately: the beacon is
/// usually an `<img>` fetch and must stay cheap.
pub(super) async fn hit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    method: Method,
    Query(args): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let mut hit = CallbackHit::new(method.as_str(), Some(addr.ip().to_string()))
        .args(args)
        .headers(header_map(&headers));

    if is_json(&headers) {
        if let Ok(value) = serde_json::from_slice(&body) {
            hit = hit.json(value);
        }
    }

    state.callbacks.record_hit(hit);
    StatusCode::NO_CONTENT
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_lowercase().contains("application/json"))
        .unwrap_or(false)
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
        .collect()
}
