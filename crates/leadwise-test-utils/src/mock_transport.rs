// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock WhatsApp transport capturing every send.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadwise_core::types::{AdapterType, DeliveryReceipt, HealthStatus};
use leadwise_core::{LeadwiseError, PluginAdapter, Transport};
use tokio::sync::{Mutex, Notify};

/// One captured send.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub tenant_id: String,
    pub recipient: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// A transport that records sends instead of delivering them.
///
/// Starts connected. `fail_next_sends(n)` makes the next `n` sends error.
pub struct MockTransport {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    connected: AtomicBool,
    failures: AtomicUsize,
    notify: Notify,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            connected: AtomicBool::new(true),
            failures: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn fail_next_sends(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Waits until at least `count` messages were sent or `timeout` passes.
    /// Returns whether the count was reached.
    pub async fn wait_for_sent(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if self.sent_count().await >= count {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let _ = tokio::time::timeout(remaining, notified).await;
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, LeadwiseError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LeadwiseError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        tenant_id: &str,
        recipient: &str,
        body: &str,
    ) -> Result<DeliveryReceipt, LeadwiseError> {
        let consumed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            return Err(LeadwiseError::transport("mock send failure"));
        }

        let sent_at = Utc::now();
        self.sent.lock().await.push(SentMessage {
            tenant_id: tenant_id.to_string(),
            recipient: recipient.to_string(),
            body: body.to_string(),
            sent_at,
        });
        self.notify.notify_waiters();
        Ok(DeliveryReceipt {
            message_id: format!("mock-{}", uuid::Uuid::new_v4()),
            accepted_at: sent_at,
        })
    }

    async fn is_connected(&self, _tenant_id: &str) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_sends_and_injected_failures() {
        let transport = MockTransport::new();
        transport.fail_next_sends(1);
        assert!(transport.send("t", "1", "a").await.is_err());
        transport.send("t", "1", "b").await.unwrap();
        let sent = transport.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "b");
        assert!(transport.wait_for_sent(1, Duration::from_millis(10)).await);
        assert!(!transport.wait_for_sent(2, Duration::from_millis(10)).await);
    }
}
