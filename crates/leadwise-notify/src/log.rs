// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Log-only fallbacks used when no endpoint is configured.

use async_trait::async_trait;
use chrono::Utc;
use leadwise_core::types::{AdapterType, DeliveryReceipt, HealthStatus};
use leadwise_core::{LeadwiseError, Notifier, OutboundSender, PluginAdapter};
use tracing::info;

/// Writes notifications to the log.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl PluginAdapter for LogNotifier {
    fn name(&self) -> &str {
        "log-notifier"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Notifier
    }

    async fn health_check(&self) -> Result<HealthStatus, LeadwiseError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LeadwiseError> {
        Ok(())
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, tenant_id: &str, subject: &str, body: &str) -> Result<(), LeadwiseError> {
        info!(tenant_id, subject, body, "notification");
        Ok(())
    }
}

/// Writes outbound messages of one channel to the log.
#[derive(Debug, Clone)]
pub struct LogSender {
    channel: String,
}

impl LogSender {
    pub fn new(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
        }
    }
}

#[async_trait]
impl PluginAdapter for LogSender {
    fn name(&self) -> &str {
        "log-sender"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Sender
    }

    async fn health_check(&self) -> Result<HealthStatus, LeadwiseError> {
        Ok(HealthStatus::Degraded(format!(
            "no {} endpoint configured; messages are only logged",
            self.channel
        )))
    }

    async fn shutdown(&self) -> Result<(), LeadwiseError> {
        Ok(())
    }
}

#[async_trait]
impl OutboundSender for LogSender {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn send(
        &self,
        tenant_id: &str,
        recipient: &str,
        subject: Option<&str>,
        body: &str,
    ) -> Result<DeliveryReceipt, LeadwiseError> {
        info!(
            tenant_id,
            channel = %self.channel,
            recipient,
            subject = subject.unwrap_or_default(),
            body,
            "outbound message (log only)"
        );
        Ok(DeliveryReceipt {
            message_id: uuid::Uuid::new_v4().to_string(),
            accepted_at: Utc::now(),
        })
    }
}
