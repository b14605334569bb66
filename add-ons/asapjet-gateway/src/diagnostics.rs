//! Temporary debug endpoints for deploy-time troubleshooting.
//!
//! Both are gated by `?password=<admin password>` so they can be hit from a
//! browser. They report config *presence*, with key prefixes only, never full
//! secrets. Remove once channel configuration has settled.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use asapjet_core::Urgency;

use crate::{auth, AppState};

#[derive(Deserialize)]
pub(crate) struct PasswordQuery {
    password: Option<String>,
}

fn query_unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Unauthorized",
            "message": "Add ?password=YOUR_ADMIN_PASSWORD to the URL",
        })),
    )
}

fn key_prefix(key: &Option<String>) -> Option<String> {
    key.as_ref()
        .map(|k| format!("{}...", k.chars().take(10).collect::<String>()))
}

fn env_check(state: &AppState) -> Value {
    let cfg = &state.notify_config;
    serde_json::json!({
        "resend": {
            "hasApiKey": cfg.resend_api_key.is_some(),
            "apiKeyPrefix": key_prefix(&cfg.resend_api_key),
            "hasEmailFrom": cfg.email_from.is_some(),
            "emailFrom": cfg.email_from,
            "hasEmailTo": cfg.email_to.is_some(),
            "emailTo": cfg.email_to,
        },
        "bland": {
            "hasApiKey": cfg.bland_api_key.is_some(),
            "hasNotifyPhone": cfg.bland_notify_phone.is_some(),
            "notifyPhone": cfg.bland_notify_phone,
        },
        "twilio": {
            "hasAccountSid": cfg.twilio_account_sid.is_some(),
            "hasAuthToken": cfg.twilio_auth_token.is_some(),
            "hasFromPhone": cfg.twilio_from_phone.is_some(),
            "hasNotifyPhone": cfg.twilio_notify_phone.is_some(),
        },
        "webhook": {
            "hasUrl": cfg.webhook_url.is_some(),
            "url": cfg.webhook_url,
        },
    })
}

/// GET /api/debug/env – which notification channels the environment enables.
pub(crate) async fn debug_env(
    State(state): State<AppState>,
    Query(q): Query<PasswordQuery>,
) -> (StatusCode, Json<Value>) {
    if !auth::verify_query_password(q.password.as_deref(), &state.config) {
        return query_unauthorized();
    }
    let cfg = &state.notify_config;
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "environment": env_check(&state),
            "emailNotificationEnabled": cfg.email_enabled(),
            "voiceNotificationEnabled": cfg.voice_enabled(),
            "smsNotificationEnabled": cfg.sms_enabled(),
            "webhookNotificationEnabled": cfg.webhook_enabled(),
        })),
    )
}

/// GET /api/test-notifications – push a canned lead through every configured
/// channel. Places real calls/emails; that's the point.
pub(crate) async fn test_notifications(
    State(state): State<AppState>,
    Query(q): Query<PasswordQuery>,
) -> (StatusCode, Json<Value>) {
    if !auth::verify_query_password(q.password.as_deref(), &state.config) {
        return query_unauthorized();
    }

    let test_lead = asapjet_core::Lead {
        id: format!("test-{}", Utc::now().timestamp_millis()),
        from_airport_or_city: "LAX".to_string(),
        to_airport_or_city: "JFK".to_string(),
        date_time: "2025-01-15T14:00".to_string(),
        pax: 2,
        name: "Test User".to_string(),
        phone: "+15551234567".to_string(),
        email: "test@example.com".to_string(),
        urgency: Urgency::Urgent,
        notes: Some("This is a test notification".to_string()),
        timestamp: Utc::now().to_rfc3339(),
        assigned_agent_id: None,
        assigned_agent_name: None,
    };

    // Awaited here (unlike the intake path) so the response reflects a settled run.
    state.notifier.dispatch(&test_lead).await;

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "message": "Test notifications dispatched",
            "channelCount": state.notifier.channel_count(),
            "envCheck": env_check(&state),
            "testLead": test_lead,
        })),
    )
}
