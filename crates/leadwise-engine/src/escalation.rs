// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human handoff: the escalation policy, the decision step, and the queue of
//! pending cases.
//!
//! A lead escalates when any of these hold:
//! - the message is negative with a sentiment score below the threshold,
//! - the text contains an urgent keyword (case-insensitive substring),
//! - the stored negative-message count reached its threshold.
//!
//! The queue keeps at most one pending case per lead; a newer escalation
//! replaces the older one.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use leadwise_bus::{BusEvent, EventBus, EventPayload};
use leadwise_config::model::EscalationConfig;
use leadwise_core::types::{
    AnalysisResult, Escalation, EscalationReason, Lead, NormalizedMessage, Sentiment,
};
use leadwise_core::{EscalationStore, LeadStore, LeadwiseError, Notifier};
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Thresholds deciding when a conversation needs a human.
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    negative_sentiment_threshold: f64,
    urgent_keywords: Vec<String>,
    negative_message_threshold: i64,
}

impl EscalationPolicy {
    pub fn new(
        negative_sentiment_threshold: f64,
        urgent_keywords: &[String],
        negative_message_threshold: i64,
    ) -> Self {
        Self {
            negative_sentiment_threshold,
            urgent_keywords: urgent_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            negative_message_threshold,
        }
    }

    pub fn from_config(config: &EscalationConfig) -> Self {
        Self::new(
            config.negative_sentiment_threshold,
            &config.urgent_keywords,
            config.negative_message_threshold,
        )
    }

    /// The first matching reason with a human-readable detail, if any.
    pub fn evaluate(
        &self,
        negative_count: i64,
        analysis: &AnalysisResult,
        text: &str,
    ) -> Option<(EscalationReason, String)> {
        if analysis.sentiment == Sentiment::Negative
            && analysis.sentiment_score < self.negative_sentiment_threshold
        {
            return Some((
                EscalationReason::NegativeSentiment,
                format!(
                    "sentiment score {:.2} below {:.2}",
                    analysis.sentiment_score, self.negative_sentiment_threshold
                ),
            ));
        }

        let lowered = text.to_lowercase();
        if let Some(keyword) = self
            .urgent_keywords
            .iter()
            .find(|k| lowered.contains(k.as_str()))
        {
            return Some((
                EscalationReason::UrgentKeyword,
                format!("message contains `{keyword}`"),
            ));
        }

        if negative_count >= self.negative_message_threshold {
            return Some((
                EscalationReason::RepeatedNegativeMessages,
                format!("{negative_count} negative messages"),
            ));
        }
        None
    }
}

/// In-process escalation store for single-instance deployments.
#[derive(Default)]
pub struct MemoryEscalationStore {
    pending: DashMap<String, Escalation>,
}

impl MemoryEscalationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EscalationStore for MemoryEscalationStore {
    async fn put(&self, escalation: &Escalation) -> Result<(), LeadwiseError> {
        self.pending
            .insert(escalation.lead_id.clone(), escalation.clone());
        Ok(())
    }

    async fn get(&self, lead_id: &str) -> Result<Option<Escalation>, LeadwiseError> {
        Ok(self.pending.get(lead_id).map(|e| e.value().clone()))
    }

    async fn list(&self, tenant_id: &str) -> Result<Vec<Escalation>, LeadwiseError> {
        let mut pending: Vec<Escalation> = self
            .pending
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .map(|e| e.value().clone())
            .collect();
        pending.sort_by_key(|e| e.created_at);
        Ok(pending)
    }

    async fn remove(&self, lead_id: &str) -> Result<Option<Escalation>, LeadwiseError> {
        Ok(self.pending.remove(lead_id).map(|(_, e)| e))
    }
}

/// Pending human-handoff cases.
pub struct EscalationQueue {
    store: Arc<dyn EscalationStore>,
    leads: Arc<dyn LeadStore>,
    notifier: Arc<dyn Notifier>,
    bus: EventBus,
    /// Coach alerts still in flight.
    notifications: TaskTracker,
}

impl EscalationQueue {
    pub fn new(
        store: Arc<dyn EscalationStore>,
        leads: Arc<dyn LeadStore>,
        notifier: Arc<dyn Notifier>,
        bus: EventBus,
    ) -> Self {
        Self {
            store,
            leads,
            notifier,
            bus,
            notifications: TaskTracker::new(),
        }
    }

    /// Records the escalation, publishes `escalation_triggered`, and alerts
    /// the coaches in the background. A notification failure is logged, not
    /// returned.
    pub async fn escalate(
        &self,
        lead: &Lead,
        reason: EscalationReason,
        detail: String,
        message: &NormalizedMessage,
        analysis: &AnalysisResult,
    ) -> Result<Escalation, LeadwiseError> {
        let escalation = Escalation {
            tenant_id: lead.tenant_id.clone(),
            lead_id: lead.id.clone(),
            reason,
            detail,
            created_at: Utc::now(),
            message: message.clone(),
            analysis: analysis.clone(),
        };
        self.store.put(&escalation).await?;
        info!(
            tenant_id = %lead.tenant_id,
            lead_id = %lead.id,
            reason = %reason,
            detail = %escalation.detail,
            "conversation escalated"
        );

        self.bus.publish(BusEvent::new(
            lead.tenant_id.clone(),
            EventPayload::EscalationTriggered {
                lead_id: lead.id.clone(),
                reason,
                detail: escalation.detail.clone(),
                analysis: analysis.clone(),
            },
        ));

        let subject = format!("Escalation: {} needs a coach", lead.name);
        let body = format!(
            "Lead {} ({}) was escalated ({}: {}).\nLast message: \"{}\"",
            lead.name, lead.phone_number, reason, escalation.detail, message.content
        );
        let notifier = Arc::clone(&self.notifier);
        let tenant_id = lead.tenant_id.clone();
        let lead_id = lead.id.clone();
        self.notifications.spawn(async move {
            if let Err(e) = notifier.notify(&tenant_id, &subject, &body).await {
                warn!(error = %e, lead_id = %lead_id, "failed to notify coaches of escalation");
            }
        });
        Ok(escalation)
    }

    /// Waits until every coach alert spawned so far has finished.
    pub async fn wait_for_notifications(&self) {
        self.notifications.close();
        self.notifications.wait().await;
        self.notifications.reopen();
    }

    pub async fn get(&self, lead_id: &str) -> Result<Option<Escalation>, LeadwiseError> {
        self.store.get(lead_id).await
    }

    /// Pending escalations of a tenant, oldest first.
    pub async fn list_pending(&self, tenant_id: &str) -> Result<Vec<Escalation>, LeadwiseError> {
        self.store.list(tenant_id).await
    }

    /// Closes the lead's pending escalation and resets its negative-message
    /// count. Returns the closed case, if there was one.
    pub async fn resolve(&self, lead_id: &str) -> Result<Option<Escalation>, LeadwiseError> {
        let Some(escalation) = self.store.remove(lead_id).await? else {
            return Ok(None);
        };
        self.leads.reset_negative_count(lead_id).await?;
        info!(lead_id, tenant_id = %escalation.tenant_id, "escalation resolved");
        Ok(Some(escalation))
    }
}

/// Decides whether a message hands the conversation to a human and, if so,
/// enqueues the escalation.
pub struct EscalationDecision {
    policy: EscalationPolicy,
    queue: Arc<EscalationQueue>,
}

impl EscalationDecision {
    pub fn new(policy: EscalationPolicy, queue: Arc<EscalationQueue>) -> Self {
        Self { policy, queue }
    }

    /// `lead.negative_message_count` must already include this message.
    pub async fn should_escalate(
        &self,
        lead: &Lead,
        analysis: &AnalysisResult,
        message: &NormalizedMessage,
    ) -> Result<bool, LeadwiseError> {
        Ok(self.decide(lead, analysis, message).await?.is_some())
    }

    /// Like [`should_escalate`](Self::should_escalate), returning the
    /// recorded escalation.
    pub async fn decide(
        &self,
        lead: &Lead,
        analysis: &AnalysisResult,
        message: &NormalizedMessage,
    ) -> Result<Option<Escalation>, LeadwiseError> {
        let Some((reason, detail)) =
            self.policy
                .evaluate(lead.negative_message_count, analysis, &message.content)
        else {
            return Ok(None);
        };
        let escalation = self
            .queue
            .escalate(lead, reason, detail, message, analysis)
            .await?;
        Ok(Some(escalation))
    }
}
