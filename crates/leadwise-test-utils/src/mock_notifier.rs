// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock notifier and named sender capturing deliveries.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use leadwise_core::types::{AdapterType, DeliveryReceipt, HealthStatus};
use leadwise_core::{LeadwiseError, Notifier, OutboundSender, PluginAdapter};
use tokio::sync::Mutex;

/// One captured notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub tenant_id: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct MockNotifier {
    notifications: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().await.clone()
    }
}

#[async_trait]
impl PluginAdapter for MockNotifier {
    fn name(&self) -> &str {
        "mock-notifier"
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
impl Notifier for MockNotifier {
    async fn notify(&self, tenant_id: &str, subject: &str, body: &str) -> Result<(), LeadwiseError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LeadwiseError::delivery("mock notifier failure"));
        }
        self.notifications.lock().await.push(Notification {
            tenant_id: tenant_id.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// One captured outbound message of a named channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub tenant_id: String,
    pub recipient: String,
    pub subject: Option<String>,
    pub body: String,
}

pub struct MockSender {
    channel: String,
    sent: Mutex<Vec<ChannelMessage>>,
}

impl MockSender {
    pub fn new(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub async fn sent(&self) -> Vec<ChannelMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl PluginAdapter for MockSender {
    fn name(&self) -> &str {
        "mock-sender"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Sender
    }

    async fn health_check(&self) -> Result<HealthStatus, LeadwiseError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LeadwiseError> {
        Ok(())
    }
}

#[async_trait]
impl OutboundSender for MockSender {
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
        self.sent.lock().await.push(ChannelMessage {
            tenant_id: tenant_id.to_string(),
            recipient: recipient.to_string(),
            subject: subject.map(str::to_string),
            body: body.to_string(),
        });
        Ok(DeliveryReceipt {
            message_id: format!("mock-{}-{}", self.channel, uuid::Uuid::new_v4()),
            accepted_at: Utc::now(),
        })
    }
}
