// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Coach notifications and named outbound senders.
//!
//! Each endpoint in `[notification]` gets a webhook-backed adapter; unset
//! endpoints fall back to log-only adapters so automations still run.

use std::sync::Arc;
use std::time::Duration;

use leadwise_config::model::NotificationConfig;
use leadwise_core::{LeadwiseError, Notifier, OutboundSender};

pub mod log;
pub mod webhook;

pub use log::{LogNotifier, LogSender};
pub use webhook::{WebhookNotifier, WebhookSender};

/// Channel name of the email sender.
pub const EMAIL: &str = "email";
/// Channel name of the SMS sender.
pub const SMS: &str = "sms";

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Builds the coach notifier from config.
pub fn notifier_from_config(config: &NotificationConfig) -> Result<Arc<dyn Notifier>, LeadwiseError> {
    Ok(match &config.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url, DELIVERY_TIMEOUT)?),
        None => Arc::new(LogNotifier),
    })
}

/// Builds the email and SMS senders from config.
pub fn senders_from_config(
    config: &NotificationConfig,
) -> Result<Vec<Arc<dyn OutboundSender>>, LeadwiseError> {
    let build = |channel: &str, url: &Option<String>| -> Result<Arc<dyn OutboundSender>, LeadwiseError> {
        Ok(match url {
            Some(url) => Arc::new(WebhookSender::new(channel, url, DELIVERY_TIMEOUT)?),
            None => Arc::new(LogSender::new(channel)),
        })
    };
    Ok(vec![
        build(EMAIL, &config.email_webhook_url)?,
        build(SMS, &config.sms_webhook_url)?,
    ])
}
