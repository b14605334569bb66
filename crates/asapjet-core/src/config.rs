//! Gateway configuration loaded from `.env`.
//!
//! Each notification channel is enabled only when every variable it needs is
//! present and non-empty; there is no separate on/off switch.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | ASAPJET_PORT | 8000 | HTTP bind port. |
//! | ASAPJET_DB_PATH | ./data/asapjet.db | SQLite file for leads + agents. |
//! | ADMIN_PASSWORD | (unset) | Shared secret for the admin surface. |
//! | RESEND_API_KEY / LEADS_NOTIFY_EMAIL_FROM / LEADS_NOTIFY_EMAIL_TO | (unset) | Email channel. |
//! | BLAND_API_KEY / BLAND_NOTIFY_PHONE | (unset) | Voice-call channel. |
//! | TWILIO_ACCOUNT_SID / TWILIO_AUTH_TOKEN / TWILIO_FROM_PHONE / TWILIO_NOTIFY_PHONE | (unset) | SMS channel. |
//! | LEADS_WEBHOOK_URL | (unset) | Generic webhook channel. |
//! | PUBLIC_CONTACT_PHONE | (unset) | Display number reported by /api/health. |

use serde::{Deserialize, Serialize};

/// Process-level settings for the gateway binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub port: u16,
    pub db_path: String,
    /// Admin surface is disabled (always 401) when unset.
    pub admin_password: Option<String>,
    pub public_contact_phone: Option<String>,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_port("ASAPJET_PORT", 8000),
            db_path: std::env::var("ASAPJET_DB_PATH")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "./data/asapjet.db".to_string()),
            admin_password: env_opt_string("ADMIN_PASSWORD"),
            public_contact_phone: env_opt_string("PUBLIC_CONTACT_PHONE"),
        }
    }
}

/// Per-channel credentials for the notification fan-out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub resend_api_key: Option<String>,
    pub email_from: Option<String>,
    pub email_to: Option<String>,
    pub bland_api_key: Option<String>,
    pub bland_notify_phone: Option<String>,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_from_phone: Option<String>,
    pub twilio_notify_phone: Option<String>,
    pub webhook_url: Option<String>,
}

impl NotifyConfig {
    pub fn from_env() -> Self {
        Self {
            resend_api_key: env_opt_string("RESEND_API_KEY"),
            email_from: env_opt_string("LEADS_NOTIFY_EMAIL_FROM"),
            email_to: env_opt_string("LEADS_NOTIFY_EMAIL_TO"),
            bland_api_key: env_opt_string("BLAND_API_KEY"),
            bland_notify_phone: env_opt_string("BLAND_NOTIFY_PHONE"),
            twilio_account_sid: env_opt_string("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: env_opt_string("TWILIO_AUTH_TOKEN"),
            twilio_from_phone: env_opt_string("TWILIO_FROM_PHONE"),
            twilio_notify_phone: env_opt_string("TWILIO_NOTIFY_PHONE"),
            webhook_url: env_opt_string("LEADS_WEBHOOK_URL"),
        }
    }

    pub fn email_enabled(&self) -> bool {
        self.resend_api_key.is_some() && self.email_from.is_some() && self.email_to.is_some()
    }

    pub fn voice_enabled(&self) -> bool {
        self.bland_api_key.is_some() && self.bland_notify_phone.is_some()
    }

    pub fn sms_enabled(&self) -> bool {
        self.twilio_account_sid.is_some()
            && self.twilio_auth_token.is_some()
            && self.twilio_from_phone.is_some()
            && self.twilio_notify_phone.is_some()
    }

    pub fn webhook_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }
}

fn env_port(name: &str, default: u16) -> u16 {
    match std::env::var(name) {
        Ok(v) => v.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_enables_no_channels() {
        let cfg = NotifyConfig::default();
        assert!(!cfg.email_enabled());
        assert!(!cfg.voice_enabled());
        assert!(!cfg.sms_enabled());
        assert!(!cfg.webhook_enabled());
    }

    #[test]
    fn partial_email_config_stays_disabled() {
        let cfg = NotifyConfig {
            resend_api_key: Some("re_test".to_string()),
            email_from: Some("leads@asapjet.test".to_string()),
            ..Default::default()
        };
        assert!(!cfg.email_enabled());
    }

    #[test]
    fn full_channel_config_enables() {
        let cfg = NotifyConfig {
            resend_api_key: Some("re_test".to_string()),
            email_from: Some("leads@asapjet.test".to_string()),
            email_to: Some("ops@asapjet.test".to_string()),
            bland_api_key: Some("bl_test".to_string()),
            bland_notify_phone: Some("+15550002222".to_string()),
            webhook_url: Some("https://hooks.test/lead".to_string()),
            ..Default::default()
        };
        assert!(cfg.email_enabled());
        assert!(cfg.voice_enabled());
        assert!(cfg.webhook_enabled());
        assert!(!cfg.sms_enabled());
    }
}
