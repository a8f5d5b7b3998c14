// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only conversation log with chronological history reads.

use std::sync::Arc;

use leadwise_core::types::{
    ContentType, DeliveryReceipt, Direction, MessageRecord, NormalizedMessage,
};
use leadwise_core::{LeadwiseError, MessageStore};

#[derive(Clone)]
pub struct ConversationStore {
    messages: Arc<dyn MessageStore>,
}

impl ConversationStore {
    pub fn new(messages: Arc<dyn MessageStore>) -> Self {
        Self { messages }
    }

    /// Whether this inbound message was already logged, as on a webhook
    /// redelivery. Messages without a transport id are never duplicates.
    pub async fn is_redelivery(
        &self,
        tenant_id: &str,
        message: &NormalizedMessage,
    ) -> Result<bool, LeadwiseError> {
        if message.external_id.is_empty() {
            return Ok(false);
        }
        self.messages
            .has_inbound_message(tenant_id, &message.external_id)
            .await
    }

    /// Appends a message exchanged with a person.
    pub async fn save(
        &self,
        tenant_id: &str,
        lead_id: &str,
        message: &NormalizedMessage,
        direction: Direction,
    ) -> Result<MessageRecord, LeadwiseError> {
        let record = MessageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            lead_id: lead_id.to_string(),
            external_id: Some(message.external_id.clone()).filter(|id| !id.is_empty()),
            sender: message.sender.clone(),
            recipient: message.recipient.clone(),
            body: message.content.clone(),
            content_type: message.content_type,
            direction,
            timestamp: message.timestamp,
            media_url: message.media_url.clone(),
            automated: false,
        };
        self.messages.insert_message(&record).await?;
        Ok(record)
    }

    /// Appends an automated outbound text that the transport accepted.
    pub async fn save_automated(
        &self,
        tenant_id: &str,
        lead_id: &str,
        recipient: &str,
        body: &str,
        receipt: &DeliveryReceipt,
    ) -> Result<MessageRecord, LeadwiseError> {
        let record = MessageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            lead_id: lead_id.to_string(),
            external_id: Some(receipt.message_id.clone()),
            sender: tenant_id.to_string(),
            recipient: recipient.to_string(),
            body: body.to_string(),
            content_type: ContentType::Text,
            direction: Direction::Outbound,
            timestamp: receipt.accepted_at,
            media_url: None,
            automated: true,
        };
        self.messages.insert_message(&record).await?;
        Ok(record)
    }

    /// The most recent `limit` messages, oldest first.
    pub async fn history(
        &self,
        tenant_id: &str,
        lead_id: &str,
        limit: i64,
    ) -> Result<Vec<MessageRecord>, LeadwiseError> {
        let mut newest_first = self
            .messages
            .recent_messages(tenant_id, lead_id, limit)
            .await?;
        newest_first.reverse();
        Ok(newest_first)
    }
}
