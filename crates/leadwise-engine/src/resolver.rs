// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Find-or-create of leads keyed by (tenant, phone).

use std::sync::Arc;

use leadwise_bus::{BusEvent, EventBus, EventPayload};
use leadwise_core::types::{LeadUpsert, NewContact, NormalizedMessage};
use leadwise_core::{LeadStore, LeadwiseError};
use tracing::{debug, info};

/// Source tag recorded on leads created from chat messages.
pub const WHATSAPP_SOURCE: &str = "whatsapp";

pub struct LeadResolver {
    leads: Arc<dyn LeadStore>,
    bus: EventBus,
    initial_score: i64,
}

impl LeadResolver {
    pub fn new(leads: Arc<dyn LeadStore>, bus: EventBus, initial_score: i64) -> Self {
        Self {
            leads,
            bus,
            initial_score,
        }
    }

    /// Returns the lead for (tenant, phone), creating it on first contact.
    ///
    /// Repeat contact bumps last-contact time and message count and marks the
    /// lead active; the score is untouched. Creation publishes `lead_created`.
    pub async fn resolve(
        &self,
        tenant_id: &str,
        phone_number: &str,
        message: &NormalizedMessage,
    ) -> Result<LeadUpsert, LeadwiseError> {
        let name = message
            .push_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(phone_number);

        let contact = NewContact {
            tenant_id: tenant_id.to_string(),
            phone_number: phone_number.to_string(),
            name: name.to_string(),
            source: WHATSAPP_SOURCE.to_string(),
            initial_score: self.initial_score,
            first_message: message.content.clone(),
            contacted_at: message.timestamp,
        };
        let upsert = self.leads.upsert_contact(&contact).await?;

        if upsert.created {
            info!(tenant_id, lead_id = %upsert.lead.id, "lead created");
            self.bus.publish(BusEvent::new(
                tenant_id,
                EventPayload::LeadCreated {
                    lead_id: upsert.lead.id.clone(),
                    phone_number: phone_number.to_string(),
                    source: WHATSAPP_SOURCE.to_string(),
                },
            ));
        } else {
            debug!(
                tenant_id,
                lead_id = %upsert.lead.id,
                message_count = upsert.lead.message_count,
                "lead contact updated"
            );
        }
        Ok(upsert)
    }
}
