// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured lifecycle event envelopes.

use chrono::{DateTime, Utc};
use leadwise_core::types::{AnalysisResult, EscalationReason, NormalizedMessage};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const LEAD_CREATED: &str = "lead_created";
pub const LEAD_STATUS_CHANGED: &str = "lead_status_changed";
pub const ESCALATION_TRIGGERED: &str = "escalation_triggered";
pub const WHATSAPP_MESSAGE_RECEIVED: &str = "whatsapp_message_received";

/// Typed payload, one variant per event kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EventPayload {
    LeadCreated {
        lead_id: String,
        phone_number: String,
        source: String,
    },
    LeadStatusChanged {
        lead_id: String,
        previous_status: String,
        status: String,
    },
    EscalationTriggered {
        lead_id: String,
        reason: EscalationReason,
        detail: String,
        analysis: AnalysisResult,
    },
    MessageReceived {
        lead_id: String,
        message: NormalizedMessage,
        analysis: AnalysisResult,
    },
    /// Any other named event. `data` must be a JSON object to be addressable
    /// by path lookups.
    Custom {
        name: String,
        lead_id: Option<String>,
        data: Value,
    },
}

impl EventPayload {
    /// Nominal event-type name that automation rules bind to.
    pub fn name(&self) -> &str {
        match self {
            EventPayload::LeadCreated { .. } => LEAD_CREATED,
            EventPayload::LeadStatusChanged { .. } => LEAD_STATUS_CHANGED,
            EventPayload::EscalationTriggered { .. } => ESCALATION_TRIGGERED,
            EventPayload::MessageReceived { .. } => WHATSAPP_MESSAGE_RECEIVED,
            EventPayload::Custom { name, .. } => name,
        }
    }

    pub fn lead_id(&self) -> Option<&str> {
        match self {
            EventPayload::LeadCreated { lead_id, .. }
            | EventPayload::LeadStatusChanged { lead_id, .. }
            | EventPayload::EscalationTriggered { lead_id, .. }
            | EventPayload::MessageReceived { lead_id, .. } => Some(lead_id),
            EventPayload::Custom { lead_id, .. } => lead_id.as_deref(),
        }
    }
}

/// Envelope published on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusEvent {
    /// Unique id; redeliveries carry the same id.
    pub id: String,
    pub tenant_id: String,
    pub occurred_at: DateTime<Utc>,
    pub payload: EventPayload,
}

impl BusEvent {
    pub fn new(tenant_id: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            occurred_at: Utc::now(),
            payload,
        }
    }

    pub fn name(&self) -> &str {
        self.payload.name()
    }

    pub fn lead_id(&self) -> Option<&str> {
        self.payload.lead_id()
    }

    /// Flat JSON view used for template rendering and condition paths.
    ///
    /// Payload fields sit at the top level next to `eventId`, `eventType`,
    /// `tenantId`, and `occurredAt`. Custom event data is merged in as-is.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        match &self.payload {
            EventPayload::Custom { lead_id, data, .. } => {
                if let Value::Object(fields) = data {
                    map.extend(fields.clone());
                } else if !data.is_null() {
                    map.insert("data".to_string(), data.clone());
                }
                if let Some(lead_id) = lead_id {
                    map.insert("leadId".to_string(), Value::String(lead_id.clone()));
                }
            }
            payload => {
                // Externally tagged: {"leadCreated": {...}}.
                if let Ok(Value::Object(tagged)) = serde_json::to_value(payload)
                    && let Some((_, Value::Object(fields))) = tagged.into_iter().next()
                {
                    map.extend(fields);
                }
            }
        }
        map.insert("eventId".to_string(), Value::String(self.id.clone()));
        map.insert("eventType".to_string(), Value::String(self.name().to_string()));
        map.insert("tenantId".to_string(), Value::String(self.tenant_id.clone()));
        map.insert(
            "occurredAt".to_string(),
            Value::String(self.occurred_at.to_rfc3339()),
        );
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_payload_flattens_to_camel_case_fields() {
        let event = BusEvent::new(
            "tenant-a",
            EventPayload::LeadStatusChanged {
                lead_id: "lead-1".into(),
                previous_status: "New".into(),
                status: "Qualified".into(),
            },
        );
        let json = event.to_json();
        assert_eq!(json["leadId"], "lead-1");
        assert_eq!(json["previousStatus"], "New");
        assert_eq!(json["status"], "Qualified");
        assert_eq!(json["eventType"], LEAD_STATUS_CHANGED);
        assert_eq!(json["tenantId"], "tenant-a");
    }

    #[test]
    fn custom_event_merges_object_data() {
        let event = BusEvent::new(
            "tenant-a",
            EventPayload::Custom {
                name: "form_submitted".into(),
                lead_id: Some("lead-9".into()),
                data: json!({"leadTemperature": "Hot", "phone": "15551234567"}),
            },
        );
        assert_eq!(event.name(), "form_submitted");
        assert_eq!(event.lead_id(), Some("lead-9"));
        let json = event.to_json();
        assert_eq!(json["leadTemperature"], "Hot");
        assert_eq!(json["leadId"], "lead-9");
    }

    #[test]
    fn nested_payloads_stay_addressable() {
        let event = BusEvent::new(
            "tenant-a",
            EventPayload::EscalationTriggered {
                lead_id: "lead-1".into(),
                reason: EscalationReason::UrgentKeyword,
                detail: "matched keyword: urgent".into(),
                analysis: AnalysisResult::fallback(),
            },
        );
        let json = event.to_json();
        assert_eq!(json["reason"], "urgent_keyword");
        assert_eq!(json["analysis"]["intent"], "general");
    }
}
