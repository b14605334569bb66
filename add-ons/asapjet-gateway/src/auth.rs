//! Admin authentication: one shared static password.
//!
//! This is a capability check ("knows the secret"), not a multi-user auth
//! system: no sessions, no expiry, no lockout beyond the request rate limiter.
//! Comparison is constant-time so the secret can't be recovered byte-by-byte
//! from response timing.

use axum::http::HeaderMap;

use asapjet_core::GatewayConfig;

/// Byte-wise comparison whose duration does not depend on where the inputs
/// first differ. A length mismatch still short-circuits; lengths are not secret.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn password_matches(candidate: &str, config: &GatewayConfig) -> bool {
    match &config.admin_password {
        // No password configured: the admin surface is disabled outright.
        None => false,
        Some(secret) => constant_time_eq(candidate, secret),
    }
}

/// `Authorization: Bearer <admin password>` check for admin routes.
pub fn verify_admin(headers: &HeaderMap, config: &GatewayConfig) -> bool {
    match bearer_token(headers) {
        Some(token) => password_matches(token, config),
        None => false,
    }
}

/// `?password=` check for the browser-accessible debug endpoints.
pub fn verify_query_password(password: Option<&str>, config: &GatewayConfig) -> bool {
    match password {
        Some(p) => password_matches(p, config),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(password: Option<&str>) -> GatewayConfig {
        GatewayConfig {
            port: 8000,
            db_path: ":memory:".to_string(),
            admin_password: password.map(str::to_string),
            public_contact_phone: None,
        }
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", value.parse().unwrap());
        headers
    }

    #[test]
    fn constant_time_eq_basic() {
        assert!(constant_time_eq("secret", "secret"));
        assert!(!constant_time_eq("secret", "secrex"));
        assert!(!constant_time_eq("secret", "secret2"));
        assert!(constant_time_eq("", ""));
    }

    #[test]
    fn bearer_with_right_password_passes() {
        let cfg = config(Some("hunter2hunter2"));
        assert!(verify_admin(&headers_with("Bearer hunter2hunter2"), &cfg));
    }

    #[test]
    fn wrong_or_missing_bearer_fails() {
        let cfg = config(Some("hunter2hunter2"));
        assert!(!verify_admin(&headers_with("Bearer nope"), &cfg));
        assert!(!verify_admin(&headers_with("Basic hunter2hunter2"), &cfg));
        assert!(!verify_admin(&HeaderMap::new(), &cfg));
    }

    #[test]
    fn unset_password_disables_admin_surface() {
        let cfg = config(None);
        assert!(!verify_admin(&headers_with("Bearer anything"), &cfg));
        assert!(!verify_query_password(Some("anything"), &cfg));
    }

    #[test]
    fn query_password_gate() {
        let cfg = config(Some("hunter2hunter2"));
        assert!(verify_query_password(Some("hunter2hunter2"), &cfg));
        assert!(!verify_query_password(Some("wrong"), &cfg));
        assert!(!verify_query_password(None, &cfg));
    }
}
