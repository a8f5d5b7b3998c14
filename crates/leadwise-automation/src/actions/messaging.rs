// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Actions that deliver templated content: WhatsApp, email, SMS, and coach
//! notifications.

use async_trait::async_trait;
use leadwise_core::LeadwiseError;
use leadwise_core::types::{ContentType, Direction, MessageRecord};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{
    ActionContext, ActionDeps, ActionHandler, ActionOutcome, CREATE_EMAIL_MESSAGE,
    CREATE_SMS_MESSAGE, SEND_NOTIFICATION, SEND_WHATSAPP, config_str, message_template,
    payload_text,
};
use crate::template::render;

const DEFAULT_PHONE_FIELD: &str = "lead.phoneNumber";
const DEFAULT_EMAIL_FIELD: &str = "lead.email";

/// `SEND_WHATSAPP`: renders `template` against the payload and sends it to
/// the phone number at `recipientField` through the tenant's session.
pub struct SendWhatsApp {
    deps: ActionDeps,
}

impl SendWhatsApp {
    pub fn new(deps: ActionDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl ActionHandler for SendWhatsApp {
    fn action_type(&self) -> &'static str {
        SEND_WHATSAPP
    }

    async fn execute(
        &self,
        config: &Value,
        ctx: &ActionContext,
    ) -> Result<ActionOutcome, LeadwiseError> {
        if ctx.tenant_id.is_empty() {
            return Ok(ActionOutcome::skipped("event has no tenant"));
        }
        let Some(template) = message_template(config) else {
            return Ok(ActionOutcome::skipped("no message template configured"));
        };
        let field = config_str(config, "recipientField").unwrap_or(DEFAULT_PHONE_FIELD);
        let Some(recipient) = payload_text(&ctx.payload, field) else {
            return Ok(ActionOutcome::skipped(format!("no recipient at `{field}`")));
        };
        if !self.deps.transport.is_connected(&ctx.tenant_id).await {
            warn!(tenant_id = %ctx.tenant_id, "WhatsApp session not connected, skipping send");
            return Ok(ActionOutcome::skipped("WhatsApp session not connected"));
        }

        let body = render(template, &ctx.payload);
        let receipt = self
            .deps
            .transport
            .send(&ctx.tenant_id, &recipient, &body)
            .await?;

        if let Some(lead_id) = &ctx.lead_id {
            let record = MessageRecord {
                id: uuid::Uuid::new_v4().to_string(),
                tenant_id: ctx.tenant_id.clone(),
                lead_id: lead_id.clone(),
                external_id: Some(receipt.message_id.clone()),
                sender: ctx.tenant_id.clone(),
                recipient: recipient.clone(),
                body,
                content_type: ContentType::Text,
                direction: Direction::Outbound,
                timestamp: receipt.accepted_at,
                media_url: None,
                automated: true,
            };
            if let Err(e) = self.deps.messages.insert_message(&record).await {
                warn!(error = %e, lead_id = %lead_id, "failed to persist automated WhatsApp message");
            }
        }

        debug!(tenant_id = %ctx.tenant_id, recipient = %recipient, "automation WhatsApp sent");
        Ok(ActionOutcome::Executed(Some(json!({
            "messageId": receipt.message_id,
            "recipient": recipient,
        }))))
    }
}

/// `CREATE_EMAIL_MESSAGE` and `CREATE_SMS_MESSAGE`: hand templated content to
/// the named sender for the channel.
///
/// The recipient is `to` (a template) or the payload value at
/// `recipientField`.
pub struct ChannelMessage {
    action_type: &'static str,
    channel: &'static str,
    default_field: &'static str,
    deps: ActionDeps,
}

impl ChannelMessage {
    pub fn email(deps: ActionDeps) -> Self {
        Self {
            action_type: CREATE_EMAIL_MESSAGE,
            channel: "email",
            default_field: DEFAULT_EMAIL_FIELD,
            deps,
        }
    }

    pub fn sms(deps: ActionDeps) -> Self {
        Self {
            action_type: CREATE_SMS_MESSAGE,
            channel: "sms",
            default_field: DEFAULT_PHONE_FIELD,
            deps,
        }
    }

    fn recipient(&self, config: &Value, payload: &Value) -> Option<String> {
        if let Some(to) = config_str(config, "to") {
            let rendered = render(to, payload);
            return (!rendered.contains("{{")).then_some(rendered);
        }
        let field = config_str(config, "recipientField").unwrap_or(self.default_field);
        payload_text(payload, field)
    }
}

#[async_trait]
impl ActionHandler for ChannelMessage {
    fn action_type(&self) -> &'static str {
        self.action_type
    }

    async fn execute(
        &self,
        config: &Value,
        ctx: &ActionContext,
    ) -> Result<ActionOutcome, LeadwiseError> {
        let Some(sender) = self.deps.sender(self.channel) else {
            return Ok(ActionOutcome::skipped(format!(
                "no {} sender configured",
                self.channel
            )));
        };
        let Some(template) = message_template(config) else {
            return Ok(ActionOutcome::skipped("no message template configured"));
        };
        let Some(recipient) = self.recipient(config, &ctx.payload) else {
            return Ok(ActionOutcome::skipped("no recipient"));
        };

        let subject = config_str(config, "subject").map(|s| render(s, &ctx.payload));
        let body = render(template, &ctx.payload);
        let receipt = sender
            .send(&ctx.tenant_id, &recipient, subject.as_deref(), &body)
            .await?;

        Ok(ActionOutcome::Executed(Some(json!({
            "channel": self.channel,
            "messageId": receipt.message_id,
            "recipient": recipient,
        }))))
    }
}

/// `SEND_NOTIFICATION`: alerts the tenant's coaches.
pub struct SendNotification {
    deps: ActionDeps,
}

impl SendNotification {
    pub fn new(deps: ActionDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl ActionHandler for SendNotification {
    fn action_type(&self) -> &'static str {
        SEND_NOTIFICATION
    }

    async fn execute(
        &self,
        config: &Value,
        ctx: &ActionContext,
    ) -> Result<ActionOutcome, LeadwiseError> {
        let Some(template) = message_template(config) else {
            return Ok(ActionOutcome::skipped("no message template configured"));
        };
        let subject = config_str(config, "subject")
            .map(|s| render(s, &ctx.payload))
            .unwrap_or_else(|| format!("Automation: {}", ctx.event_type));
        let body = render(template, &ctx.payload);

        self.deps
            .notifier
            .notify(&ctx.tenant_id, &subject, &body)
            .await?;
        Ok(ActionOutcome::Executed(Some(json!({ "subject": subject }))))
    }
}

