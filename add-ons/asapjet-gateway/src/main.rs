//! ASAP Jet gateway: lead intake, on-call agent roster, and notification fan-out.
//!
//! Request flow: validate → persist (snapshotting the on-call agent) → spawn the
//! notification dispatch. Only the synchronous SQLite write can fail the request;
//! delivery failures are logged and swallowed.

mod agents;
mod auth;
mod charter_sqlite;
mod diagnostics;
mod leads;
mod limiter;
mod notifications;
mod vapi;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use chrono::Utc;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use asapjet_core::{GatewayConfig, NotifyConfig};

use charter_sqlite::CharterDb;
use limiter::RateLimiter;
use notifications::Notifier;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<GatewayConfig>,
    pub(crate) notify_config: Arc<NotifyConfig>,
    pub(crate) db: CharterDb,
    pub(crate) notifier: Arc<Notifier>,
    pub(crate) limiter: Arc<RateLimiter>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "asapjet_gateway=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = GatewayConfig::from_env();
    let notify_config = NotifyConfig::from_env();

    if config.admin_password.is_none() {
        warn!("ADMIN_PASSWORD not set - admin surface is disabled");
    }

    let db = CharterDb::new(PathBuf::from(&config.db_path)).expect("open charter database");
    info!("Charter database at {}", db.path().display());

    let notifier = Arc::new(Notifier::from_config(&notify_config));
    info!("{} notification channel(s) configured", notifier.channel_count());

    let port = config.port;
    let state = AppState {
        config: Arc::new(config),
        notify_config: Arc::new(notify_config),
        db,
        notifier,
        limiter: Arc::new(RateLimiter::per_minute()),
    };
    let app = build_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("ASAP Jet gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind gateway port");
    axum::serve(listener, app).await.expect("serve gateway");
}

fn build_app(state: AppState) -> Router {
    // The form is served from a separate marketing site; allow any origin.
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/leads", post(leads::submit_lead))
        .route("/api/admin/leads", get(leads::admin_list_leads))
        .route(
            "/api/admin/agents",
            get(agents::list_agents).post(agents::create_agent),
        )
        .route(
            "/api/admin/agents/:id",
            get(agents::get_agent)
                .patch(agents::update_agent)
                .delete(agents::delete_agent),
        )
        .route(
            "/api/vapi/inbound",
            post(vapi::inbound_call).get(vapi::inbound_echo),
        )
        .route("/api/debug/env", get(diagnostics::debug_env))
        .route("/api/test-notifications", get(diagnostics::test_notifications))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            limiter::rate_limit,
        ))
        .layer(cors)
        .with_state(state)
}

/// GET /api/health – liveness plus which notification channels are configured.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let cfg = &state.notify_config;
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "timestamp": Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION"),
            "contactPhone": state.config.public_contact_phone,
            "notifications": {
                "email": cfg.email_enabled(),
                "voice": cfg.voice_enabled(),
                "sms": cfg.sms_enabled(),
                "webhook": cfg.webhook_enabled(),
            },
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const TEST_PASSWORD: &str = "test-secret-password";

    fn test_state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let db = CharterDb::new(dir.path().join("charter.db")).unwrap();
        let state = AppState {
            config: Arc::new(GatewayConfig {
                port: 0,
                db_path: dir.path().join("charter.db").display().to_string(),
                admin_password: Some(TEST_PASSWORD.to_string()),
                public_contact_phone: Some("+1-555-JET-0000".to_string()),
            }),
            notify_config: Arc::new(NotifyConfig::default()),
            db,
            notifier: Arc::new(Notifier::from_config(&NotifyConfig::default())),
            limiter: Arc::new(RateLimiter::per_minute()),
        };
        (dir, state)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    }

    fn admin_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {TEST_PASSWORD}"))
            .header("content-type", "application/json");
        match body {
            Some(body) => builder
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn response_json(res: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn valid_lead_body() -> Value {
        serde_json::json!({
            "from_airport_or_city": "LAX",
            "to_airport_or_city": "JFK",
            "date_time": "2025-06-01T10:00",
            "pax": 2,
            "name": "Jane Doe",
            "phone": "5551234567",
            "email": "jane@example.com",
            "urgency": "urgent"
        })
    }

    #[tokio::test]
    async fn health_reports_status_and_channel_flags() {
        let (_dir, state) = test_state();
        let app = build_app(state);
        let res = app
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = response_json(res).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["notifications"]["email"], false);
        assert_eq!(json["contactPhone"], "+1-555-JET-0000");
    }

    #[tokio::test]
    async fn valid_lead_submission_returns_201_and_persists() {
        let (_dir, state) = test_state();
        let app = build_app(state.clone());

        let before = Utc::now();
        let res = app
            .oneshot(json_request("POST", "/api/leads", valid_lead_body()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let json = response_json(res).await;
        assert_eq!(json["success"], true);
        let lead_id = json["leadId"].as_str().expect("leadId string").to_string();

        let stored = state.db.all_leads();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, lead_id);
        assert_eq!(stored[0].from_airport_or_city, "LAX");
        let ts = chrono::DateTime::parse_from_rfc3339(&stored[0].timestamp).unwrap();
        let elapsed = ts.signed_duration_since(before).num_seconds().abs();
        assert!(elapsed < 5, "timestamp should be within a few seconds");
    }

    #[tokio::test]
    async fn zero_pax_submission_is_rejected_naming_passenger_count() {
        let (_dir, state) = test_state();
        let app = build_app(state.clone());

        let mut body = valid_lead_body();
        body["pax"] = serde_json::json!(0);
        let res = app.oneshot(json_request("POST", "/api/leads", body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = response_json(res).await;
        assert_eq!(json["success"], false);
        let details = json["details"].as_array().unwrap();
        assert!(details
            .iter()
            .any(|d| d["field"] == "pax" && d["message"].as_str().unwrap().contains("passenger")));

        // Nothing persisted on rejection.
        assert!(state.db.all_leads().is_empty());
    }

    #[tokio::test]
    async fn repeated_submissions_get_unique_ids_in_order() {
        let (_dir, state) = test_state();
        let app = build_app(state.clone());

        let mut ids = Vec::new();
        for _ in 0..3 {
            let res = app
                .clone()
                .oneshot(json_request("POST", "/api/leads", valid_lead_body()))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::CREATED);
            ids.push(response_json(res).await["leadId"].as_str().unwrap().to_string());
        }
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 3);

        let stored = state.db.all_leads();
        // Newest first; timestamps non-decreasing with submission order.
        assert_eq!(stored[0].id, ids[2]);
        assert!(stored[2].timestamp <= stored[1].timestamp);
        assert!(stored[1].timestamp <= stored[0].timestamp);
    }

    #[tokio::test]
    async fn admin_routes_require_the_bearer_password() {
        let (_dir, state) = test_state();
        let app = build_app(state);

        let res = app
            .clone()
            .oneshot(Request::builder().uri("/api/admin/agents").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app
            .oneshot(
                Request::builder()
                    .uri("/api/admin/agents")
                    .header("authorization", "Bearer wrong-password")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn on_call_handoff_via_api_leaves_one_agent_on_call() {
        let (_dir, state) = test_state();
        let app = build_app(state);

        let res = app
            .clone()
            .oneshot(admin_request(
                "POST",
                "/api/admin/agents",
                Some(serde_json::json!({
                    "name": "Ava", "email": "ava@asapjet.test",
                    "phone": "+15550001111", "on_call": true
                })),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);

        let res = app
            .clone()
            .oneshot(admin_request(
                "POST",
                "/api/admin/agents",
                Some(serde_json::json!({
                    "name": "Ben", "email": "ben@asapjet.test",
                    "phone": "+15550002222", "on_call": true
                })),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let ben = response_json(res).await["agent"]["id"].as_str().unwrap().to_string();

        let res = app
            .oneshot(admin_request("GET", "/api/admin/agents", None))
            .await
            .unwrap();
        let json = response_json(res).await;
        let on_call: Vec<_> = json["agents"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|a| a["on_call"] == true)
            .collect();
        assert_eq!(on_call.len(), 1);
        assert_eq!(on_call[0]["id"], ben.as_str());
    }

    #[tokio::test]
    async fn duplicate_agent_email_returns_conflict() {
        let (_dir, state) = test_state();
        let app = build_app(state);

        let body = serde_json::json!({
            "name": "Ava", "email": "ava@asapjet.test", "phone": "+15550001111"
        });
        let res = app
            .clone()
            .oneshot(admin_request("POST", "/api/admin/agents", Some(body.clone())))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);

        let res = app
            .oneshot(admin_request("POST", "/api/admin/agents", Some(body)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn create_agent_with_missing_fields_is_rejected() {
        let (_dir, state) = test_state();
        let app = build_app(state);
        let res = app
            .oneshot(admin_request(
                "POST",
                "/api/admin/agents",
                Some(serde_json::json!({ "name": "Ava" })),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn patch_unknown_agent_is_not_found() {
        let (_dir, state) = test_state();
        let app = build_app(state);
        let res = app
            .oneshot(admin_request(
                "PATCH",
                "/api/admin/agents/no-such-id",
                Some(serde_json::json!({ "on_call": true })),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn inbound_call_with_departure_only_saves_placeholder_lead() {
        let (_dir, state) = test_state();
        let app = build_app(state.clone());

        let res = app
            .oneshot(json_request(
                "POST",
                "/api/vapi/inbound",
                serde_json::json!({ "departure": "Boston" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = response_json(res).await;
        assert_eq!(json["success"], true);
        assert!(json["leadId"].is_string());

        let stored = state.db.all_leads();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].from_airport_or_city, "Boston");
        assert_eq!(stored[0].to_airport_or_city, "Not provided");
        assert_eq!(stored[0].email, "noemail@phonelead.com");
        assert_eq!(stored[0].urgency, asapjet_core::Urgency::Urgent);
    }

    #[tokio::test]
    async fn lead_submissions_hit_the_rate_limit_after_five() {
        let (_dir, state) = test_state();
        let app = build_app(state);

        for _ in 0..5 {
            let res = app
                .clone()
                .oneshot(json_request("POST", "/api/leads", serde_json::json!({})))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        }
        let res = app
            .oneshot(json_request("POST", "/api/leads", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn debug_env_is_gated_by_query_password() {
        let (_dir, state) = test_state();
        let app = build_app(state);

        let res = app
            .clone()
            .oneshot(Request::builder().uri("/api/debug/env").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/debug/env?password={TEST_PASSWORD}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = response_json(res).await;
        assert_eq!(json["emailNotificationEnabled"], false);
        assert_eq!(json["environment"]["resend"]["hasApiKey"], false);
    }

    #[tokio::test]
    async fn vapi_echo_answers_get() {
        let (_dir, state) = test_state();
        let app = build_app(state);
        let res = app
            .oneshot(Request::builder().uri("/api/vapi/inbound").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = response_json(res).await;
        assert_eq!(json["service"], "vapi-inbound-webhook");
    }
}
