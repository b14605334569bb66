//! Notification fan-out: alert staff about a new lead on every configured channel.
//!
//! Channels are capabilities behind the `NotificationChannel` trait so they can be
//! added or removed by configuration without touching the dispatcher. All attempts
//! run concurrently and settle independently; a channel failure is logged and
//! swallowed, never retried, and never reaches the submitting request. The intake
//! handler spawns the dispatch and responds without waiting for delivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{error, info, warn};

use asapjet_core::{Agent, Lead, NotifyConfig};

const RESEND_API_URL: &str = "https://api.resend.com/emails";
const BLAND_API_URL: &str = "https://api.bland.ai/v1/calls";
const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{service} returned {status}: {body}")]
    Provider {
        service: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
}

async fn check_status(
    service: &'static str,
    res: reqwest::Response,
) -> Result<(), NotifyError> {
    if res.status().is_success() {
        return Ok(());
    }
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    Err(NotifyError::Provider {
        service,
        status,
        body,
    })
}

/// One outbound delivery capability (email, voice, SMS, webhook).
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;
    async fn deliver(&self, lead: &Lead) -> Result<(), NotifyError>;
}

// ── Email (Resend) ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct EmailChannel {
    client: reqwest::Client,
    api_key: String,
    from: String,
    to: String,
}

impl EmailChannel {
    pub async fn send_text(&self, to: &str, subject: &str, text: &str) -> Result<(), NotifyError> {
        let res = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "text": text,
            }))
            .send()
            .await?;
        check_status("Resend", res).await
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn deliver(&self, lead: &Lead) -> Result<(), NotifyError> {
        let subject = format!(
            "New ASAP Jet Lead - {} - {}",
            email_urgency_label(lead),
            lead.name
        );
        self.send_text(&self.to, &subject, &lead_email_text(lead)).await
    }
}

fn email_urgency_label(lead: &Lead) -> String {
    match lead.urgency {
        asapjet_core::Urgency::Critical => "🚨 CRITICAL".to_string(),
        asapjet_core::Urgency::Urgent => "⚡ URGENT".to_string(),
        asapjet_core::Urgency::Normal => "Normal".to_string(),
    }
}

/// Plain-text summary sent to the ops address.
pub fn lead_email_text(lead: &Lead) -> String {
    format!(
        "New Charter Lead Received\n\
         ========================\n\n\
         Urgency: {}\n\
         Time: {}\n\n\
         PASSENGER INFO\n\
         --------------\n\
         Name: {}\n\
         Email: {}\n\
         Phone: {}\n\
         Passengers: {}\n\n\
         FLIGHT INFO\n\
         -----------\n\
         From: {}\n\
         To: {}\n\
         Date/Time: {}\n\n\
         NOTES\n\
         -----\n\
         {}\n\n\
         ---\n\
         Lead ID: {}",
        email_urgency_label(lead),
        lead.timestamp,
        lead.name,
        lead.email,
        lead.phone,
        lead.pax,
        lead.from_airport_or_city,
        lead.to_airport_or_city,
        lead.date_time,
        lead.notes.as_deref().unwrap_or("None"),
        lead.id,
    )
}

/// Email sent to an agent when they are placed on call.
pub fn on_call_email_text(agent: &Agent) -> String {
    format!(
        "Hi {},\n\n\
         You have been placed ON CALL for ASAP Jet charter lead notifications.\n\n\
         What this means:\n\
         - You will receive email notifications for all new charter leads\n\
         - You will receive phone call notifications for urgent and critical leads\n\
         - Phone notifications will be sent to: {}\n\n\
         Please ensure your phone is on and you're monitoring {} for lead emails.\n\n\
         If you need to be taken off call, please contact your administrator.\n\n\
         Thank you,\n\
         ASAP Jet System",
        agent.name, agent.phone, agent.email,
    )
}

// ── Voice call (Bland) ─────────────────────────────────────────────────────

pub struct VoiceChannel {
    client: reqwest::Client,
    api_key: String,
    notify_phone: String,
}

#[async_trait]
impl NotificationChannel for VoiceChannel {
    fn name(&self) -> &'static str {
        "voice"
    }

    async fn deliver(&self, lead: &Lead) -> Result<(), NotifyError> {
        let res = self
            .client
            .post(BLAND_API_URL)
            // Bland takes the raw key, not a Bearer prefix.
            .header("Authorization", &self.api_key)
            .json(&serde_json::json!({
                "phone_number": self.notify_phone,
                "task": call_script(lead),
                "voice": "maya",
                "max_duration": 3,
                "record": true,
                "wait_for_greeting": true,
            }))
            .send()
            .await?;
        check_status("Bland", res).await
    }
}

/// Script read aloud by the TTS caller.
pub fn call_script(lead: &Lead) -> String {
    let notes_line = match &lead.notes {
        Some(notes) => format!("Additional notes: {}.\n\n", notes),
        None => String::new(),
    };
    format!(
        "Hi, this is an automated notification from ASAP Jet.\n\n\
         You have a new {} priority charter lead.\n\n\
         Passenger name: {}.\n\n\
         Route: {} to {}.\n\n\
         Departure: {}.\n\n\
         Number of passengers: {}.\n\n\
         Contact phone: {}.\n\n\
         Contact email: {}.\n\n\
         {}This lead was submitted at {}.\n\n\
         Lead ID: {}.\n\n\
         You can view full details in your admin dashboard. Thank you.",
        lead.urgency.label(),
        lead.name,
        lead.from_airport_or_city,
        lead.to_airport_or_city,
        lead.date_time,
        lead.pax,
        lead.phone,
        lead.email,
        notes_line,
        lead.timestamp,
        lead.id,
    )
}

// ── SMS (Twilio) ───────────────────────────────────────────────────────────

pub struct SmsChannel {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from: String,
    to: String,
}

#[async_trait]
impl NotificationChannel for SmsChannel {
    fn name(&self) -> &'static str {
        "sms"
    }

    async fn deliver(&self, lead: &Lead) -> Result<(), NotifyError> {
        let url = format!("{}/Accounts/{}/Messages.json", TWILIO_API_BASE, self.account_sid);
        let res = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("To", self.to.as_str()),
                ("From", self.from.as_str()),
                ("Body", sms_text(lead).as_str()),
            ])
            .send()
            .await?;
        check_status("Twilio", res).await
    }
}

/// Short templated text; full detail goes out over email.
pub fn sms_text(lead: &Lead) -> String {
    format!(
        "ASAP Jet: new {} lead. {}: {} to {}, {}, {} pax. Call {}",
        lead.urgency.label(),
        lead.name,
        lead.from_airport_or_city,
        lead.to_airport_or_city,
        lead.date_time,
        lead.pax,
        lead.phone,
    )
}

// ── Generic webhook ────────────────────────────────────────────────────────

pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, lead: &Lead) -> Result<(), NotifyError> {
        let res = self.client.post(&self.url).json(lead).send().await?;
        check_status("Webhook", res).await
    }
}

// ── Dispatcher ─────────────────────────────────────────────────────────────

/// Holds every channel the environment enables. Built once at startup.
pub struct Notifier {
    channels: Vec<Arc<dyn NotificationChannel>>,
    /// Kept separately for the on-call handoff email to an agent's own address.
    email: Option<EmailChannel>,
}

impl Notifier {
    pub fn from_config(cfg: &NotifyConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();
        let mut email = None;

        if cfg.email_enabled() {
            let ch = EmailChannel {
                client: client.clone(),
                api_key: cfg.resend_api_key.clone().unwrap_or_default(),
                from: cfg.email_from.clone().unwrap_or_default(),
                to: cfg.email_to.clone().unwrap_or_default(),
            };
            email = Some(ch.clone());
            channels.push(Arc::new(ch));
        }
        if cfg.voice_enabled() {
            channels.push(Arc::new(VoiceChannel {
                client: client.clone(),
                api_key: cfg.bland_api_key.clone().unwrap_or_default(),
                notify_phone: cfg.bland_notify_phone.clone().unwrap_or_default(),
            }));
        }
        if cfg.sms_enabled() {
            channels.push(Arc::new(SmsChannel {
                client: client.clone(),
                account_sid: cfg.twilio_account_sid.clone().unwrap_or_default(),
                auth_token: cfg.twilio_auth_token.clone().unwrap_or_default(),
                from: cfg.twilio_from_phone.clone().unwrap_or_default(),
                to: cfg.twilio_notify_phone.clone().unwrap_or_default(),
            }));
        }
        if cfg.webhook_enabled() {
            channels.push(Arc::new(WebhookChannel {
                client,
                url: cfg.webhook_url.clone().unwrap_or_default(),
            }));
        }

        Self { channels, email }
    }

    #[cfg(test)]
    pub fn with_channels(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self {
            channels,
            email: None,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Attempt every channel concurrently and return once all have settled.
    /// Never fails: per-channel errors are logged and isolated from siblings.
    pub async fn dispatch(&self, lead: &Lead) {
        if self.channels.is_empty() {
            warn!(target: "asapjet::notify", "No notification channels configured; lead {} persisted silently", lead.id);
            return;
        }
        let attempts = self.channels.iter().map(|ch| {
            let ch = Arc::clone(ch);
            async move {
                match ch.deliver(lead).await {
                    Ok(()) => {
                        info!(target: "asapjet::notify", "{} notification sent for lead {}", ch.name(), lead.id);
                    }
                    Err(e) => {
                        error!(target: "asapjet::notify", "{} notification failed for lead {}: {}", ch.name(), lead.id, e);
                    }
                }
            }
        });
        join_all(attempts).await;
    }

    /// Fire-and-forget dispatch: the HTTP response never waits on delivery.
    pub fn spawn_dispatch(self: Arc<Self>, lead: Lead) {
        tokio::spawn(async move {
            self.dispatch(&lead).await;
        });
    }

    /// Best-effort email to the agent who just went on call. Failures are logged
    /// and swallowed; the roster update must not break on a mail problem.
    pub fn spawn_on_call_notification(self: Arc<Self>, agent: Agent) {
        let Some(email) = self.email.clone() else {
            warn!(target: "asapjet::notify", "On-call notification skipped - email channel not configured");
            return;
        };
        tokio::spawn(async move {
            let subject = "🚨 You are now ON CALL for ASAP Jet Leads";
            match email
                .send_text(&agent.email, subject, &on_call_email_text(&agent))
                .await
            {
                Ok(()) => {
                    info!(target: "asapjet::notify", "On-call notification sent to {}", agent.email);
                }
                Err(e) => {
                    error!(target: "asapjet::notify", "On-call notification failed for {}: {}", agent.email, e);
                }
            }
        });
    }
}
