// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Coach notifications and named outbound senders (email, SMS).

use async_trait::async_trait;

use crate::error::LeadwiseError;
use crate::traits::adapter::PluginAdapter;
use crate::types::DeliveryReceipt;

/// Delivers operator alerts such as escalations.
#[async_trait]
pub trait Notifier: PluginAdapter {
    async fn notify(&self, tenant_id: &str, subject: &str, body: &str) -> Result<(), LeadwiseError>;
}

/// A non-chat outbound channel addressed by name ("email", "sms").
#[async_trait]
pub trait OutboundSender: PluginAdapter {
    /// The channel name this sender is registered under.
    fn channel(&self) -> &str;

    async fn send(
        &self,
        tenant_id: &str,
        recipient: &str,
        subject: Option<&str>,
        body: &str,
    ) -> Result<DeliveryReceipt, LeadwiseError>;
}
