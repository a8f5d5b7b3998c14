// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook-backed notifier and senders.
//!
//! Every delivery is a JSON POST. A 2xx answer is success; an `{"id"}` in
//! the response body becomes the receipt id, otherwise one is generated.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use leadwise_core::types::{AdapterType, DeliveryReceipt, HealthStatus};
use leadwise_core::{LeadwiseError, Notifier, OutboundSender, PluginAdapter};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationPayload<'a> {
    tenant_id: &'a str,
    subject: &'a str,
    body: &'a str,
    sent_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutboundPayload<'a> {
    tenant_id: &'a str,
    channel: &'a str,
    to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<&'a str>,
    body: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct AcceptedResponse {
    id: Option<String>,
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, LeadwiseError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LeadwiseError::Delivery {
            message: format!("failed to build HTTP client: {e}"),
            source: Some(Box::new(e)),
        })
}

/// POSTs `body` and returns the id from the response, if any.
async fn post_json<B: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
) -> Result<Option<String>, LeadwiseError> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| LeadwiseError::Delivery {
            message: format!("webhook request failed: {e}"),
            source: Some(Box::new(e)),
        })?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(LeadwiseError::delivery(format!("webhook returned {status}: {text}")));
    }
    let text = response.text().await.unwrap_or_default();
    let accepted: AcceptedResponse = serde_json::from_str(&text).unwrap_or_default();
    Ok(accepted.id)
}

/// Posts coach alerts to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, LeadwiseError> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl PluginAdapter for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook-notifier"
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
impl Notifier for WebhookNotifier {
    async fn notify(&self, tenant_id: &str, subject: &str, body: &str) -> Result<(), LeadwiseError> {
        let payload = NotificationPayload {
            tenant_id,
            subject,
            body,
            sent_at: leadwise_core::types::format_timestamp(&Utc::now()),
        };
        post_json(&self.client, &self.url, &payload).await?;
        debug!(tenant_id, subject, "notification delivered");
        Ok(())
    }
}

/// Relays one named channel (email, SMS) to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookSender {
    client: reqwest::Client,
    channel: String,
    url: String,
}

impl WebhookSender {
    pub fn new(channel: &str, url: &str, timeout: Duration) -> Result<Self, LeadwiseError> {
        Ok(Self {
            client: build_client(timeout)?,
            channel: channel.to_string(),
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl PluginAdapter for WebhookSender {
    fn name(&self) -> &str {
        "webhook-sender"
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
impl OutboundSender for WebhookSender {
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
        let payload = OutboundPayload {
            tenant_id,
            channel: &self.channel,
            to: recipient,
            subject,
            body,
        };
        let id = post_json(&self.client, &self.url, &payload).await?;
        Ok(DeliveryReceipt {
            message_id: id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            accepted_at: Utc::now(),
        })
    }
}
