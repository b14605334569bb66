//! Inbound-call webhook: leads phoned in through the AI voice assistant.
//!
//! Bypasses form validation on purpose: the adapter fills anything missing
//! with placeholders rather than dropping a live caller's request.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;
use tracing::{error, info};

use asapjet_core::lead_input_from_call;

use crate::AppState;

/// POST /api/vapi/inbound – map whatever shape the assistant sent into a lead.
pub(crate) async fn inbound_call(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let input = lead_input_from_call(&body);
    info!(
        target: "asapjet::vapi",
        "Inbound call lead: {} -> {} ({} pax)",
        input.from_airport_or_city, input.to_airport_or_city, input.pax
    );

    match state.db.save_lead(input) {
        Ok(lead) => {
            Arc::clone(&state.notifier).spawn_dispatch(lead.clone());
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "success": true,
                    "leadId": lead.id,
                    "message": "Lead created from phone call",
                })),
            )
        }
        Err(e) => {
            error!(target: "asapjet::vapi", "Inbound call lead save failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "success": false,
                    "error": "Failed to process call data",
                })),
            )
        }
    }
}

/// GET /api/vapi/inbound – reachability echo for webhook configuration.
pub(crate) async fn inbound_echo() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "vapi-inbound-webhook",
        "endpoint": "Use POST to submit call data",
    }))
}
