//! Inbound voice-call adapter: maps voice-AI webhook payloads into a `LeadInput`.
//!
//! The assistant posts one of several shapes depending on how the tool is wired:
//! direct function-call parameters as the body, an end-of-call report under
//! `message.analysis.structuredData`, `message.functionCall.parameters`,
//! tool-call arguments (sometimes a JSON-encoded string), or nothing structured
//! at all plus a raw transcript.
//!
//! Policy: never reject a real call. Missing fields get human-readable
//! placeholders instead of failing validation, and urgency defaults to urgent
//! because every inbound call is treated as time-sensitive. Precision is traded
//! for capture-every-lead recall.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::lead::{LeadInput, Urgency};

pub const PLACEHOLDER_LOCATION: &str = "Not provided";
pub const PLACEHOLDER_DATE: &str = "To be confirmed";
pub const PLACEHOLDER_NAME: &str = "Phone Lead";
pub const PLACEHOLDER_PHONE: &str = "Not provided";
pub const PLACEHOLDER_EMAIL: &str = "noemail@phonelead.com";

/// Build a best-effort `LeadInput` from an arbitrary voice-AI webhook payload.
pub fn lead_input_from_call(payload: &Value) -> LeadInput {
    let params = structured_params(payload);
    let transcript = transcript_text(payload);

    let mut from = first_string(&params, &["from_airport_or_city", "departure", "from"]);
    let mut to = first_string(&params, &["to_airport_or_city", "destination", "to"]);

    // Fall back to scanning the transcript for "from X" / "to Y" phrases.
    if from.is_none() || to.is_none() {
        if let Some(text) = &transcript {
            let (t_from, t_to) = route_from_transcript(text);
            from = from.or(t_from);
            to = to.or(t_to);
        }
    }

    LeadInput {
        from_airport_or_city: from.unwrap_or_else(|| PLACEHOLDER_LOCATION.to_string()),
        to_airport_or_city: to.unwrap_or_else(|| PLACEHOLDER_LOCATION.to_string()),
        date_time: first_string(&params, &["date_time", "departure_date", "date"])
            .unwrap_or_else(|| PLACEHOLDER_DATE.to_string()),
        pax: pax_value(&params),
        name: first_string(&params, &["name", "caller_name"])
            .unwrap_or_else(|| PLACEHOLDER_NAME.to_string()),
        phone: first_string(&params, &["phone", "phone_number", "caller_phone"])
            .unwrap_or_else(|| PLACEHOLDER_PHONE.to_string()),
        email: first_string(&params, &["email"])
            .unwrap_or_else(|| PLACEHOLDER_EMAIL.to_string()),
        urgency: urgency_value(&params),
        notes: first_string(&params, &["notes"]).or(transcript),
    }
}

/// Locate the structured parameter object inside the payload, in precedence order.
fn structured_params(payload: &Value) -> Value {
    if let Some(p) = payload.pointer("/message/functionCall/parameters") {
        if p.is_object() {
            return p.clone();
        }
    }
    if let Some(args) = payload.pointer("/message/toolCalls/0/function/arguments") {
        match args {
            Value::Object(_) => return args.clone(),
            // Some assistant configurations double-encode the arguments.
            Value::String(s) => {
                if let Ok(parsed) = serde_json::from_str::<Value>(s) {
                    if parsed.is_object() {
                        return parsed;
                    }
                }
            }
            _ => {}
        }
    }
    if let Some(p) = payload.pointer("/message/analysis/structuredData") {
        if p.is_object() {
            return p.clone();
        }
    }
    payload.clone()
}

fn transcript_text(payload: &Value) -> Option<String> {
    for path in ["/transcript", "/message/transcript", "/message/artifact/transcript"] {
        if let Some(s) = payload.pointer(path).and_then(Value::as_str) {
            let s = s.trim();
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    None
}

fn first_string(params: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = params.get(*key).and_then(Value::as_str) {
            let s = s.trim();
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    None
}

/// Passenger count as a number or a numeric string; anything else becomes 1.
fn pax_value(params: &Value) -> i64 {
    let raw = params
        .get("pax")
        .or_else(|| params.get("passengers"))
        .or_else(|| params.get("passenger_count"));
    match raw {
        Some(Value::Number(n)) => n.as_i64().filter(|p| *p >= 1).unwrap_or(1),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok().filter(|p| *p >= 1).unwrap_or(1),
        _ => 1,
    }
}

fn urgency_value(params: &Value) -> Urgency {
    match params.get("urgency").and_then(Value::as_str) {
        Some(s) if s.trim().eq_ignore_ascii_case("normal") => Urgency::Normal,
        Some(s) if s.trim().eq_ignore_ascii_case("critical") => Urgency::Critical,
        _ => Urgency::Urgent,
    }
}

// Phrase boundaries: stop a captured place name at a connective, punctuation,
// or end of sentence. Best-effort by design; false positives are acceptable.
static FROM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bfrom\s+([a-z][a-z .'\-]{1,40}?)(?:\s+(?:to|on|at|next|this|tomorrow|today|with|for)\b|[,.!?;]|$)",
    )
    .expect("transcript from regex")
});
static TO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bto\s+([a-z][a-z .'\-]{1,40}?)(?:\s+(?:from|on|at|next|this|tomorrow|today|with|for)\b|[,.!?;]|$)",
    )
    .expect("transcript to regex")
});

/// Scan a free-text transcript for "from X" / "to Y" phrases and recover a
/// (origin, destination) pair. Isolated so the heuristics can evolve without
/// touching persistence or notification logic.
///
/// The first "from" wins; the *last* "to" wins, so "wants to fly from Chicago
/// to Denver" recovers Denver rather than "fly".
pub fn route_from_transcript(transcript: &str) -> (Option<String>, Option<String>) {
    let from = FROM_RE
        .captures(transcript)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| s.len() >= 2);
    let to = TO_RE
        .captures_iter(transcript)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| s.len() >= 2)
        .last();
    (from, to)
}
