//! Lead intake and the admin read surface.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::Value;
use tracing::{error, info};

use asapjet_core::validate_payload;

use crate::{auth, AppState};

/// POST /api/leads – validate, persist, fan out notifications (non-blocking).
pub(crate) async fn submit_lead(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let input = match validate_payload(&body) {
        Ok(input) => input,
        Err(errors) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "success": false,
                    "error": "Invalid form data",
                    "details": errors.errors,
                })),
            );
        }
    };

    match state.db.save_lead(input) {
        Ok(lead) => {
            info!(target: "asapjet::leads", "Lead {} saved ({} -> {})", lead.id, lead.from_airport_or_city, lead.to_airport_or_city);
            // Notifications must not delay the form response.
            Arc::clone(&state.notifier).spawn_dispatch(lead.clone());
            (
                StatusCode::CREATED,
                Json(serde_json::json!({ "success": true, "leadId": lead.id })),
            )
        }
        Err(e) => {
            error!(target: "asapjet::leads", "Lead save failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "success": false,
                    "error": "Internal server error",
                })),
            )
        }
    }
}

/// GET /api/admin/leads – all leads, newest first; degrades to an empty list on
/// a read failure so the dashboard always renders.
pub(crate) async fn admin_list_leads(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !auth::verify_admin(&headers, &state.config) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Unauthorized" })),
        );
    }
    let leads = state.db.all_leads();
    (StatusCode::OK, Json(serde_json::json!({ "leads": leads })))
}
