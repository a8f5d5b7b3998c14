// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound messaging transport (WhatsApp session gateway, etc.).

use async_trait::async_trait;

use crate::error::LeadwiseError;
use crate::traits::adapter::PluginAdapter;
use crate::types::DeliveryReceipt;

/// Sends chat messages on behalf of a tenant's connected session.
#[async_trait]
pub trait Transport: PluginAdapter {
    /// Sends `body` to `recipient` through the tenant's session.
    async fn send(
        &self,
        tenant_id: &str,
        recipient: &str,
        body: &str,
    ) -> Result<DeliveryReceipt, LeadwiseError>;

    /// Whether the tenant's session is currently able to send.
    async fn is_connected(&self, tenant_id: &str) -> bool;
}
