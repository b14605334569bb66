//! Process-local request rate limiting.
//!
//! Fixed-window counters keyed by client address + path, held in memory and
//! cleared on restart. Advisory only: it slows abuse of the public form, it is
//! not a correctness mechanism. Owned by `AppState` so tests can reset it.

use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashmap::DashMap;
use tracing::warn;

use crate::AppState;

/// 5 requests/minute on the public lead form.
pub const LEADS_MAX_PER_WINDOW: u32 = 5;
/// 10 requests/minute on admin paths.
pub const ADMIN_MAX_PER_WINDOW: u32 = 10;

struct WindowEntry {
    count: u32,
    reset_at: Instant,
}

pub struct RateLimiter {
    window: Duration,
    entries: DashMap<String, WindowEntry>,
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: DashMap::new(),
        }
    }

    pub fn per_minute() -> Self {
        Self::new(Duration::from_secs(60))
    }

    /// Count one request against `key`; false once `max` is exceeded within the
    /// current window.
    pub fn check(&self, key: &str, max: u32) -> bool {
        let now = Instant::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert(WindowEntry {
            count: 0,
            reset_at: now + self.window,
        });
        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + self.window;
        }
        if entry.count >= max {
            return false;
        }
        entry.count += 1;
        true
    }

    /// Drop all counters (tests, and nothing persists across restarts anyway).
    pub fn reset(&self) {
        self.entries.clear();
    }
}

/// First forwarded hop, falling back through `x-real-ip` to a shared bucket.
fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn limit_for_path(path: &str) -> Option<u32> {
    if path.starts_with("/api/leads") {
        Some(LEADS_MAX_PER_WINDOW)
    } else if path.starts_with("/api/admin") {
        Some(ADMIN_MAX_PER_WINDOW)
    } else {
        None
    }
}

/// Axum middleware applying the per-route limits before any handler runs.
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if let Some(max) = limit_for_path(&path) {
        let key = format!("{}:{}", client_ip(req.headers()), path);
        if !state.limiter.check(&key, max) {
            warn!(target: "asapjet::limiter", "Rate limit exceeded for {}", key);
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "Too many requests. Please try again later."
                })),
            )
                .into_response();
        }
    }
    next.run(req).await
}
