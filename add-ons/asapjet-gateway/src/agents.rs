//! Admin CRUD over the on-call agent roster.
//!
//! Every handler requires `Authorization: Bearer <admin password>`. Moving the
//! on-call flag to an agent fires a best-effort handoff email to them; a mail
//! failure never fails the roster change.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::Value;
use tracing::error;

use asapjet_core::{AgentInput, AgentUpdate};

use crate::charter_sqlite::StoreError;
use crate::{auth, AppState};

fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "Unauthorized" })),
    )
}

fn store_error_response(context: &str, e: StoreError) -> (StatusCode, Json<Value>) {
    match e {
        StoreError::DuplicateEmail => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "An agent with this email already exists" })),
        ),
        StoreError::AgentNotFound => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Agent not found" })),
        ),
        StoreError::Sqlite(e) => {
            error!(target: "asapjet::agents", "{} failed: {}", context, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Internal server error" })),
            )
        }
    }
}

/// GET /api/admin/agents – roster, newest-created first.
pub(crate) async fn list_agents(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !auth::verify_admin(&headers, &state.config) {
        return unauthorized();
    }
    match state.db.list_agents() {
        Ok(agents) => (StatusCode::OK, Json(serde_json::json!({ "agents": agents }))),
        Err(e) => store_error_response("List agents", e),
    }
}

/// POST /api/admin/agents – create; 409 when the email is already taken.
pub(crate) async fn create_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !auth::verify_admin(&headers, &state.config) {
        return unauthorized();
    }

    let input: AgentInput = match serde_json::from_value(body) {
        Ok(input) => input,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "Name, email, and phone are required" })),
            );
        }
    };
    if input.name.trim().is_empty() || input.email.trim().is_empty() || input.phone.trim().is_empty()
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Name, email, and phone are required" })),
        );
    }

    match state.db.create_agent(input) {
        Ok(agent) => {
            if agent.on_call {
                Arc::clone(&state.notifier).spawn_on_call_notification(agent.clone());
            }
            (StatusCode::CREATED, Json(serde_json::json!({ "agent": agent })))
        }
        Err(e) => store_error_response("Create agent", e),
    }
}

/// GET /api/admin/agents/:id
pub(crate) async fn get_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    if !auth::verify_admin(&headers, &state.config) {
        return unauthorized();
    }
    match state.db.get_agent(&id) {
        Ok(Some(agent)) => (StatusCode::OK, Json(serde_json::json!({ "agent": agent }))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Agent not found" })),
        ),
        Err(e) => store_error_response("Get agent", e),
    }
}

/// PATCH /api/admin/agents/:id – merge-patch; `on_call: true` hands off duty.
pub(crate) async fn update_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !auth::verify_admin(&headers, &state.config) {
        return unauthorized();
    }

    let patch: AgentUpdate = match serde_json::from_value(body) {
        Ok(patch) => patch,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "Invalid agent fields" })),
            );
        }
    };
    let went_on_call = patch.on_call == Some(true);

    match state.db.update_agent(&id, patch) {
        Ok(agent) => {
            if went_on_call {
                Arc::clone(&state.notifier).spawn_on_call_notification(agent.clone());
            }
            (StatusCode::OK, Json(serde_json::json!({ "agent": agent })))
        }
        Err(e) => store_error_response("Update agent", e),
    }
}

/// DELETE /api/admin/agents/:id – unconditional; lead snapshots stay intact.
pub(crate) async fn delete_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    if !auth::verify_admin(&headers, &state.config) {
        return unauthorized();
    }
    match state.db.delete_agent(&id) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "success": true }))),
        Err(e) => store_error_response("Delete agent", e),
    }
}
