// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery of scheduled conversation steps.
//!
//! Each tick releases expired locks, claims due steps, and delivers them
//! concurrently. Delivery is at-least-once: a crash between send and ack
//! leaves the step locked until its lock expires, after which it is sent
//! again.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use leadwise_automation::template;
use leadwise_config::model::SchedulerConfig;
use leadwise_core::types::{Lead, ScheduledStep, StepStatus, max_stored_timestamp};
use leadwise_core::{LeadStore, LeadwiseError, StepQueue, Transport};
use serde_json::Value;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::conversation::ConversationStore;

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub poll_interval: Duration,
    pub batch_size: i64,
    pub lock_for: Duration,
    pub retry_backoff: Duration,
}

impl DispatcherSettings {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            batch_size: config.batch_size.max(1),
            lock_for: Duration::from_secs(config.lock_timeout_secs.max(1)),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

/// Counts from one dispatcher tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub released: i64,
    pub claimed: usize,
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
}

enum Delivery {
    Sent,
    Retry(String),
    Abandon(String),
}

/// Template context for a step: the lead's fields at the top level and again
/// under `lead`.
pub fn lead_context(lead: &Lead) -> Value {
    let mut context = serde_json::to_value(lead).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut context {
        let snapshot = Value::Object(map.clone());
        map.insert("lead".to_string(), snapshot);
    }
    context
}

pub struct StepDispatcher {
    queue: Arc<dyn StepQueue>,
    leads: Arc<dyn LeadStore>,
    transport: Arc<dyn Transport>,
    store: ConversationStore,
    wake: Arc<Notify>,
    settings: DispatcherSettings,
}

impl StepDispatcher {
    pub fn new(
        queue: Arc<dyn StepQueue>,
        leads: Arc<dyn LeadStore>,
        transport: Arc<dyn Transport>,
        store: ConversationStore,
        wake: Arc<Notify>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            queue,
            leads,
            transport,
            store,
            wake,
            settings,
        }
    }

    /// Delivers every step due at `now`, up to one batch.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, LeadwiseError> {
        let mut report = TickReport {
            released: self.queue.release_expired(now).await?,
            ..TickReport::default()
        };
        if report.released > 0 {
            warn!(released = report.released, "released steps with expired locks");
        }

        let steps = self
            .queue
            .claim_due(now, self.settings.batch_size, self.settings.lock_for)
            .await?;
        report.claimed = steps.len();
        if steps.is_empty() {
            return Ok(report);
        }
        debug!(claimed = steps.len(), "claimed due steps");

        let outcomes =
            futures::future::join_all(steps.iter().map(|step| self.dispatch(step, now))).await;
        for outcome in outcomes {
            match outcome {
                Ok(StepStatus::Completed) => report.sent += 1,
                Ok(StepStatus::Pending) => report.retried += 1,
                Ok(_) => report.failed += 1,
                Err(e) => {
                    error!(error = %e, "failed to record step outcome");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn dispatch(
        &self,
        step: &ScheduledStep,
        now: DateTime<Utc>,
    ) -> Result<StepStatus, LeadwiseError> {
        match self.deliver(step).await {
            Delivery::Sent => {
                self.queue.complete(step.id).await?;
                Ok(StepStatus::Completed)
            }
            Delivery::Retry(reason) => {
                let retry_at = now
                    .checked_add_signed(self.backoff(step.attempts))
                    .unwrap_or_else(max_stored_timestamp);
                let status = self.queue.fail(step.id, &reason, Some(retry_at)).await?;
                warn!(
                    step_id = step.id,
                    tenant_id = %step.tenant_id,
                    lead_id = %step.lead_id,
                    rule_id = %step.rule_id,
                    attempt = step.attempts + 1,
                    %status,
                    reason = %reason,
                    "step delivery failed"
                );
                Ok(status)
            }
            Delivery::Abandon(reason) => {
                warn!(
                    step_id = step.id,
                    lead_id = %step.lead_id,
                    reason = %reason,
                    "step abandoned"
                );
                self.queue.fail(step.id, &reason, None).await
            }
        }
    }

    async fn deliver(&self, step: &ScheduledStep) -> Delivery {
        let lead = match self.leads.get_lead(&step.lead_id).await {
            Ok(Some(lead)) => lead,
            Ok(None) => return Delivery::Abandon("lead no longer exists".to_string()),
            Err(e) => return Delivery::Retry(format!("failed to load lead: {e}")),
        };

        if !self.transport.is_connected(&step.tenant_id).await {
            return Delivery::Retry("tenant session not connected".to_string());
        }

        let body = template::render(&step.template, &lead_context(&lead));
        let receipt = match self
            .transport
            .send(&step.tenant_id, &lead.phone_number, &body)
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => return Delivery::Retry(e.to_string()),
        };
        info!(
            step_id = step.id,
            tenant_id = %step.tenant_id,
            lead_id = %lead.id,
            rule_id = %step.rule_id,
            step_index = step.step_index,
            message_id = %receipt.message_id,
            "automated step sent"
        );

        // The message is out; a failed log write must not cause a resend.
        if let Err(e) = self
            .store
            .save_automated(&step.tenant_id, &lead.id, &lead.phone_number, &body, &receipt)
            .await
        {
            error!(error = %e, step_id = step.id, "failed to persist automated message");
        }
        Delivery::Sent
    }

    fn backoff(&self, attempts: i64) -> TimeDelta {
        let factor = 1u32 << attempts.clamp(0, 16) as u32;
        TimeDelta::from_std(self.settings.retry_backoff.saturating_mul(factor))
            .unwrap_or(TimeDelta::MAX)
    }

    /// Polls until cancelled, waking early when an immediate step is scheduled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(
            poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
            batch_size = self.settings.batch_size,
            "step dispatcher running"
        );
        loop {
            match self.tick(Utc::now()).await {
                // A full batch means more may be due right away.
                Ok(report) if report.claimed as i64 >= self.settings.batch_size => continue,
                Ok(_) => {}
                Err(e) => error!(error = %e, "step dispatcher tick failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                _ = self.wake.notified() => {}
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping step dispatcher");
                    break;
                }
            }
        }
        info!("step dispatcher stopped");
    }
}
