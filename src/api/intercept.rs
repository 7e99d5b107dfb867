// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Intercept endpoints: toggle, flow submission, listing and decisions

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::ApiError;
use crate::intercept::{Decision, DecisionKind, Flow, Modification};
use crate::state::AppState;

/// GET /ui/intercept/status
pub(super) async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "enabled": state.toggle.enabled() }))
}

#[derive(Debug, Default, Deserialize)]
struct ToggleBody {
    enabled: Option<bool>,
}

/// POST /ui/intercept/toggle
///
/// An explicit `{"enabled": x}` sets the toggle; an absent body (or a body
/// without the field) flips it.
pub(super) async fn toggle(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request: ToggleBody = if body.is_empty() {
        ToggleBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid toggle body: {}", e)))?
    };

    let enabled = match request.enabled {
        Some(value) => state.toggle.set(value),
        None => state.toggle.flip(),
    };
    tracing::info!(enabled, "intercept toggled");
    Ok(Json(json!({ "enabled": enabled })))
}

/// GET /ui/intercept/list
pub(super) async fn list(State(state): State<AppState>) -> Json<Vec<Flow>> {
    Json(state.broker.list_pending())
}

/// POST /cli/intercept/new
///
/// Registers a flow submitted by an out-of-process proxy engine. The
/// in-process engine talks to the broker directly.
pub(super) async fn submit(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let flow: Flow = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid flow: {}", e)))?;
    if flow.flow_id.is_empty() {
        return Err(ApiError::BadRequest("flow_id must not be empty".to_string()));
    }
    state.broker.submit(flow);
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub(super) struct DecisionQuery {
    flow_id: Option<String>,
}

/// GET /cli/intercept/decision?flow_id=...
///
/// Polling claim for out-of-process engines: returns `{}` while the flow is
/// undecided, otherwise the decision, after which the flow is gone.
pub(super) async fn poll_decision(
    State(state): State<AppState>,
    Query(query): Query<DecisionQuery>,
) -> Result<Json<Value>, ApiError> {
    let flow_id = query
        .flow_id
        .ok_or_else(|| ApiError::BadRequest("flow_id query parameter is required".to_string()))?;

    match state.broker.claim(&flow_id) {
        Some(decision) => Ok(Json(json!({
            "decision": decision.kind.as_str(),
            "modified": decision.modified,
        }))),
        None => Ok(Json(json!({}))),
    }
}

#[derive(Debug, Deserialize)]
struct DecisionBody {
    flow_id: String,
    decision: String,
    #[serde(default)]
    modified: Option<Modification>,
}

/// POST /cli/intercept/decision
pub(super) async fn post_decision(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body: DecisionBody = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid decision body: {}", e)))?;

    let kind = DecisionKind::parse(&body.decision)?;
    let decision = match kind {
        DecisionKind::Forward => Decision::forward(),
        DecisionKind::Drop => Decision::drop(),
        DecisionKind::Modify => {
            let modification = body.modified.unwrap_or_default();
            modification.validate()?;
            Decision::modify(modification)
        }
    };

    state.broker.decide(&body.flow_id, decision)?;
    Ok(Json(json!({ "ok": true })))
}
