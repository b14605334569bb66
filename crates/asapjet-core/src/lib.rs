//! ASAP Jet core: shared types and pure logic for the charter lead-capture gateway.
//!
//! - `lead`: the Lead record, urgency tiers, and form validation
//! - `agent`: on-call agent roster records
//! - `config`: `.env`-driven configuration structs
//! - `inbound`: voice-AI webhook payload mapping (best-effort, capture every lead)

pub mod agent;
pub mod config;
pub mod inbound;
pub mod lead;

pub use agent::{Agent, AgentInput, AgentUpdate};
pub use config::{GatewayConfig, NotifyConfig};
pub use inbound::lead_input_from_call;
pub use lead::{validate_lead, validate_payload, Lead, LeadInput, Urgency, ValidationErrors};
