// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound message pipeline.
//!
//! drop redeliveries → resolve lead → persist inbound → analyse → score →
//! escalate, or schedule conversation rules and publish
//! `whatsapp_message_received`. An escalated message only produces
//! `escalation_triggered`, so generic automation rules stay silent too.
//!
//! Persisting the inbound message, scoring, and rule scheduling are
//! log-and-continue steps. Lead resolution and the escalation decision
//! propagate their errors: without a lead nothing downstream is addressable,
//! and without a decision no automated reply may go out.

use std::sync::Arc;

use leadwise_ai::AnalysisClient;
use leadwise_bus::{BusEvent, EventBus, EventPayload};
use leadwise_core::types::{
    AnalysisResult, Direction, EscalationReason, Lead, NormalizedMessage, Sentiment,
};
use leadwise_core::{LeadStore, LeadwiseError};
use leadwise_whatsapp::InboundEnvelope;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::conversation::ConversationStore;
use crate::escalation::EscalationDecision;
use crate::resolver::LeadResolver;
use crate::rules::{ConversationRuleEngine, TriggerContext};
use crate::scoring::ScoringUpdater;

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Not a conversation message (group, status, own echo, no sender), or
    /// a redelivery of one already handled.
    Ignored(&'static str),
    /// Handed to a human; no conversation rule ran.
    Escalated {
        lead_id: String,
        reason: EscalationReason,
    },
    Processed {
        lead_id: String,
        /// Ids of the conversation steps scheduled for this message.
        scheduled_steps: Vec<i64>,
    },
}

pub struct InboundPipeline {
    resolver: LeadResolver,
    store: ConversationStore,
    analysis: AnalysisClient,
    scoring: ScoringUpdater,
    leads: Arc<dyn LeadStore>,
    escalation: EscalationDecision,
    rules: Arc<ConversationRuleEngine>,
    bus: EventBus,
}

/// Why a message is not part of a lead conversation, if it isn't.
fn ignore_reason(message: &NormalizedMessage) -> Option<&'static str> {
    if message.is_status_broadcast {
        Some("status broadcast")
    } else if message.is_group {
        Some("group message")
    } else if message.from_me {
        Some("sent by the tenant")
    } else if message.sender.trim().is_empty() {
        Some("missing sender")
    } else {
        None
    }
}

impl InboundPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        resolver: LeadResolver,
        store: ConversationStore,
        analysis: AnalysisClient,
        scoring: ScoringUpdater,
        leads: Arc<dyn LeadStore>,
        escalation: EscalationDecision,
        rules: Arc<ConversationRuleEngine>,
        bus: EventBus,
    ) -> Self {
        Self {
            resolver,
            store,
            analysis,
            scoring,
            leads,
            escalation,
            rules,
            bus,
        }
    }

    /// Runs one inbound message through the pipeline to completion.
    pub async fn handle(
        &self,
        tenant_id: &str,
        message: NormalizedMessage,
    ) -> Result<PipelineOutcome, LeadwiseError> {
        if let Some(reason) = ignore_reason(&message) {
            debug!(tenant_id, external_id = %message.external_id, reason, "inbound message ignored");
            return Ok(PipelineOutcome::Ignored(reason));
        }

        match self.store.is_redelivery(tenant_id, &message).await {
            Ok(true) => {
                debug!(tenant_id, external_id = %message.external_id, "duplicate webhook delivery ignored");
                return Ok(PipelineOutcome::Ignored("duplicate delivery"));
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, tenant_id, "failed to check for duplicate delivery"),
        }

        let upsert = self
            .resolver
            .resolve(tenant_id, &message.sender, &message)
            .await?;
        let first_message = upsert.created;
        let mut lead = upsert.lead;

        if let Err(e) = self
            .store
            .save(tenant_id, &lead.id, &message, Direction::Inbound)
            .await
        {
            error!(error = %e, tenant_id, lead_id = %lead.id, "failed to persist inbound message");
        }

        let analysis = self.analysis.analyze(&message.content).await;

        match self
            .scoring
            .apply_interaction_score(&lead.id, &analysis)
            .await
        {
            Ok(Some(score)) => lead.score = score,
            Ok(None) => {}
            Err(e) => warn!(error = %e, lead_id = %lead.id, "failed to update lead score"),
        }

        if analysis.sentiment == Sentiment::Negative {
            match self.leads.increment_negative_count(&lead.id).await {
                Ok(count) => lead.negative_message_count = count,
                Err(e) => warn!(error = %e, lead_id = %lead.id, "failed to count negative message"),
            }
        }

        if let Some(escalation) = self.escalation.decide(&lead, &analysis, &message).await? {
            return Ok(PipelineOutcome::Escalated {
                lead_id: lead.id,
                reason: escalation.reason,
            });
        }

        let scheduled_steps = self.schedule_rules(tenant_id, &lead, &message, &analysis, first_message).await;
        info!(
            tenant_id,
            lead_id = %lead.id,
            first_message,
            sentiment = %analysis.sentiment,
            scheduled = scheduled_steps.len(),
            "inbound message processed"
        );
        self.publish_received(&lead, message, analysis);
        Ok(PipelineOutcome::Processed {
            lead_id: lead.id,
            scheduled_steps,
        })
    }

    async fn schedule_rules(
        &self,
        tenant_id: &str,
        lead: &Lead,
        message: &NormalizedMessage,
        analysis: &AnalysisResult,
        first_message: bool,
    ) -> Vec<i64> {
        if let Err(e) = self.rules.ensure_defaults(tenant_id).await {
            warn!(error = %e, tenant_id, "failed to seed default conversation rules");
        }
        let ctx = TriggerContext {
            first_message,
            analysis,
            text: &message.content,
        };
        match self.rules.process(tenant_id, &lead.id, &ctx).await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, tenant_id, lead_id = %lead.id, "failed to schedule conversation rules");
                Vec::new()
            }
        }
    }

    fn publish_received(&self, lead: &Lead, message: NormalizedMessage, analysis: AnalysisResult) {
        self.bus.publish(BusEvent::new(
            lead.tenant_id.clone(),
            EventPayload::MessageReceived {
                lead_id: lead.id.clone(),
                message,
                analysis,
            },
        ));
    }

    /// Consumes webhook deliveries until cancelled or every sender is gone.
    /// Messages run concurrently; in-flight ones finish before returning.
    pub async fn run(
        self: Arc<Self>,
        mut inbound: mpsc::Receiver<InboundEnvelope>,
        cancel: CancellationToken,
    ) {
        info!("inbound pipeline running");
        let tracker = TaskTracker::new();

        loop {
            tokio::select! {
                received = inbound.recv() => match received {
                    Some(envelope) => {
                        let pipeline = Arc::clone(&self);
                        tracker.spawn(async move {
                            let InboundEnvelope { tenant_id, message } = envelope;
                            let external_id = message.external_id.clone();
                            if let Err(e) = pipeline.handle(&tenant_id, message).await {
                                error!(
                                    error = %e,
                                    tenant_id = %tenant_id,
                                    external_id = %external_id,
                                    "failed to process inbound message"
                                );
                            }
                        });
                    }
                    None => break,
                },
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping inbound pipeline");
                    break;
                }
            }
        }

        tracker.close();
        tracker.wait().await;
        info!("inbound pipeline stopped");
    }
}
