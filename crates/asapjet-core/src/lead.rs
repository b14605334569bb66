//! Lead records and quote-form validation.
//!
//! A lead is write-once: created through the store, never updated or deleted.
//! Validation rejects the whole submission with every violated field listed,
//! so the form can highlight all problems in one round trip.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// How fast the requester needs a quote back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Normal,
    Urgent,
    Critical,
}

impl Urgency {
    /// Label used in operator-facing notification text.
    pub fn label(&self) -> &'static str {
        match self {
            Urgency::Critical => "CRITICAL",
            Urgency::Urgent => "URGENT",
            Urgency::Normal => "Standard",
        }
    }

    /// Wire/storage form, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Normal => "normal",
            Urgency::Urgent => "urgent",
            Urgency::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Urgency> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(Urgency::Normal),
            "urgent" => Some(Urgency::Urgent),
            "critical" => Some(Urgency::Critical),
            _ => None,
        }
    }
}

impl Default for Urgency {
    fn default() -> Self {
        Urgency::Normal
    }
}

/// Raw quote-request fields as submitted by the form or the inbound-call adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadInput {
    pub from_airport_or_city: String,
    pub to_airport_or_city: String,
    /// Free text; human phrases like "next Tuesday morning" are accepted as-is.
    pub date_time: String,
    pub pax: i64,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub urgency: Urgency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A persisted lead: the validated input plus server-generated identity, the
/// submission timestamp, and a snapshot of whoever was on call at save time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub from_airport_or_city: String,
    pub to_airport_or_city: String,
    pub date_time: String,
    pub pax: i64,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub urgency: Urgency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// RFC-3339 UTC, set by the store at insert time.
    pub timestamp: String,
    /// Copied from the agent roster at insert time; survives later roster edits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent_name: Option<String>,
}

impl Lead {
    pub fn from_input(
        input: LeadInput,
        id: String,
        timestamp: String,
        assigned_agent: Option<(String, String)>,
    ) -> Self {
        let (assigned_agent_id, assigned_agent_name) = match assigned_agent {
            Some((id, name)) => (Some(id), Some(name)),
            None => (None, None),
        };
        Lead {
            id,
            from_airport_or_city: input.from_airport_or_city,
            to_airport_or_city: input.to_airport_or_city,
            date_time: input.date_time,
            pax: input.pax,
            name: input.name,
            phone: input.phone,
            email: input.email,
            urgency: input.urgency,
            notes: input.notes,
            timestamp,
            assigned_agent_id,
            assigned_agent_name,
        }
    }
}

/// One violated field with a human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every violated field in one rejection; the request is never partially accepted.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("invalid lead: {}", .errors.iter().map(|e| e.field.as_str()).collect::<Vec<_>>().join(", "))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

// Good-enough address shape; deliverability is the email provider's problem.
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));

fn push_err(errors: &mut Vec<FieldError>, field: &str, message: &str) {
    errors.push(FieldError {
        field: field.to_string(),
        message: message.to_string(),
    });
}

/// Validate and normalize a submitted lead. Field rules:
/// origin/destination 2–100 chars, date_time non-empty, pax 1–50, name 2–100,
/// phone 10–20 chars, email address-shaped, notes at most 1000 chars.
pub fn validate_lead(mut input: LeadInput) -> Result<LeadInput, ValidationErrors> {
    let mut errors = Vec::new();

    input.from_airport_or_city = input.from_airport_or_city.trim().to_string();
    input.to_airport_or_city = input.to_airport_or_city.trim().to_string();
    input.date_time = input.date_time.trim().to_string();
    input.name = input.name.trim().to_string();
    input.phone = input.phone.trim().to_string();
    input.email = input.email.trim().to_string();
    input.notes = input
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let from_len = input.from_airport_or_city.chars().count();
    if !(2..=100).contains(&from_len) {
        push_err(
            &mut errors,
            "from_airport_or_city",
            "Departure location is required",
        );
    }
    let to_len = input.to_airport_or_city.chars().count();
    if !(2..=100).contains(&to_len) {
        push_err(&mut errors, "to_airport_or_city", "Destination is required");
    }
    if input.date_time.is_empty() {
        push_err(&mut errors, "date_time", "Travel date and time is required");
    }
    if input.pax < 1 {
        push_err(&mut errors, "pax", "At least 1 passenger required");
    } else if input.pax > 50 {
        push_err(&mut errors, "pax", "Maximum 50 passengers");
    }
    let name_len = input.name.chars().count();
    if !(2..=100).contains(&name_len) {
        push_err(&mut errors, "name", "Name is required");
    }
    let phone_len = input.phone.chars().count();
    if !(10..=20).contains(&phone_len) {
        push_err(&mut errors, "phone", "Valid phone number required");
    }
    if !EMAIL_RE.is_match(&input.email) {
        push_err(&mut errors, "email", "Valid email required");
    }
    if let Some(notes) = &input.notes {
        if notes.chars().count() > 1000 {
            push_err(&mut errors, "notes", "Notes too long (max 1000 characters)");
        }
    }

    if errors.is_empty() {
        Ok(input)
    } else {
        Err(ValidationErrors { errors })
    }
}

/// Validate an arbitrary incoming JSON payload. Structural problems (missing or
/// mistyped fields) are reported the same way as range violations, so the form
/// gets one complete error list regardless of how broken the body is.
pub fn validate_payload(payload: &serde_json::Value) -> Result<LeadInput, ValidationErrors> {
    let text = |key: &str| -> String {
        payload
            .get(key)
            .and_then(serde_json::Value::as_str)
            .unwrap_or("")
            .to_string()
    };

    let urgency_raw = payload.get("urgency").and_then(serde_json::Value::as_str);
    let urgency = urgency_raw.and_then(Urgency::parse);

    let input = LeadInput {
        from_airport_or_city: text("from_airport_or_city"),
        to_airport_or_city: text("to_airport_or_city"),
        date_time: text("date_time"),
        // Non-integer pax falls out of range and is reported on that field.
        pax: payload.get("pax").and_then(serde_json::Value::as_i64).unwrap_or(0),
        name: text("name"),
        phone: text("phone"),
        email: text("email"),
        urgency: urgency.unwrap_or_default(),
        notes: payload
            .get("notes")
            .and_then(serde_json::Value::as_str)
            .map(|s| s.to_string()),
    };

    let mut result = validate_lead(input);
    if urgency.is_none() {
        let err = FieldError {
            field: "urgency".to_string(),
            message: "Urgency must be normal, urgent, or critical".to_string(),
        };
        result = match result {
            Ok(_) => Err(ValidationErrors { errors: vec![err] }),
            Err(mut e) => {
                e.errors.push(err);
                Err(e)
            }
        };
    }
    result
}
