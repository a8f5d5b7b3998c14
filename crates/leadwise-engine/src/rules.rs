// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation rules: trigger matching and step scheduling.
//!
//! A matching rule schedules every one of its steps at once, each due at
//! `fired_at + delay_ms`. Steps are durable rows in the step queue; the
//! [`StepDispatcher`](crate::dispatcher::StepDispatcher) delivers them.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashSet;
use leadwise_core::types::{
    AnalysisResult, ConversationRule, ConversationTrigger, NewScheduledStep, RuleStep, Sentiment,
    Urgency, clamp_timestamp, max_stored_timestamp,
};
use leadwise_core::{ConversationRuleStore, LeadwiseError, StepQueue};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// What a trigger is matched against.
#[derive(Debug, Clone, Copy)]
pub struct TriggerContext<'a> {
    pub first_message: bool,
    pub analysis: &'a AnalysisResult,
    pub text: &'a str,
}

pub fn trigger_matches(trigger: &ConversationTrigger, ctx: &TriggerContext<'_>) -> bool {
    match trigger {
        ConversationTrigger::FirstMessage => ctx.first_message,
        ConversationTrigger::NegativeSentiment => ctx.analysis.sentiment == Sentiment::Negative,
        ConversationTrigger::UrgentMessage => ctx.analysis.urgency == Urgency::High,
        ConversationTrigger::KeywordMatch { keywords } => {
            let text = ctx.text.to_lowercase();
            keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .any(|k| !k.is_empty() && text.contains(&k))
        }
    }
}

fn step(delay_ms: u64, template: &str) -> RuleStep {
    RuleStep {
        delay_ms,
        template: template.to_string(),
    }
}

/// Rules seeded for a tenant that has none. Ids are derived from the tenant
/// so concurrent seeding converges on the same rows.
pub fn default_rules(tenant_id: &str) -> Vec<ConversationRule> {
    vec![
        ConversationRule {
            id: format!("{tenant_id}-welcome"),
            tenant_id: tenant_id.to_string(),
            name: "Welcome sequence".to_string(),
            trigger: ConversationTrigger::FirstMessage,
            steps: vec![
                step(
                    0,
                    "Hi {{name}}! Thanks for reaching out. A coach will be with you shortly.",
                ),
                step(
                    5 * 60 * 1000,
                    "While you wait, {{name}}: what is the main goal you would like help with?",
                ),
                step(
                    24 * 60 * 60 * 1000,
                    "Hi {{name}}, just checking in. Would you like to book a free discovery call?",
                ),
            ],
            is_active: true,
        },
        ConversationRule {
            id: format!("{tenant_id}-support"),
            tenant_id: tenant_id.to_string(),
            name: "Negative sentiment support".to_string(),
            trigger: ConversationTrigger::NegativeSentiment,
            steps: vec![step(
                0,
                "I'm sorry to hear that, {{name}}. Your coach has been told and will follow up personally.",
            )],
            is_active: true,
        },
        ConversationRule {
            id: format!("{tenant_id}-urgent"),
            tenant_id: tenant_id.to_string(),
            name: "Urgent acknowledgement".to_string(),
            trigger: ConversationTrigger::UrgentMessage,
            steps: vec![step(
                0,
                "Got it, {{name}}. We are treating this as a priority and will reply as soon as possible.",
            )],
            is_active: true,
        },
    ]
}

/// `fired_at + delay_ms`, saturating at the latest storable instant.
pub fn due_at(fired_at: DateTime<Utc>, delay_ms: u64) -> DateTime<Utc> {
    let delay = TimeDelta::try_milliseconds(i64::try_from(delay_ms).unwrap_or(i64::MAX))
        .unwrap_or(TimeDelta::MAX);
    fired_at
        .checked_add_signed(delay)
        .map_or_else(max_stored_timestamp, clamp_timestamp)
}

pub struct ConversationRuleEngine {
    rules: Arc<dyn ConversationRuleStore>,
    steps: Arc<dyn StepQueue>,
    wake: Arc<Notify>,
    seeded: DashSet<String>,
}

impl ConversationRuleEngine {
    pub fn new(rules: Arc<dyn ConversationRuleStore>, steps: Arc<dyn StepQueue>) -> Self {
        Self {
            rules,
            steps,
            wake: Arc::new(Notify::new()),
            seeded: DashSet::new(),
        }
    }

    /// Signalled whenever a step is scheduled that is already due.
    pub fn wake_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }

    /// Seeds [`default_rules`] when the tenant has no rules at all. Returns
    /// whether anything was written.
    pub async fn ensure_defaults(&self, tenant_id: &str) -> Result<bool, LeadwiseError> {
        if self.seeded.contains(tenant_id) {
            return Ok(false);
        }
        let existing = self.rules.count_conversation_rules(tenant_id).await?;
        let mut wrote = false;
        if existing == 0 {
            for rule in default_rules(tenant_id) {
                self.rules.save_conversation_rule(&rule).await?;
            }
            info!(tenant_id, "default conversation rules seeded");
            wrote = true;
        }
        self.seeded.insert(tenant_id.to_string());
        Ok(wrote)
    }

    /// Schedules the steps of every active rule whose trigger matches.
    ///
    /// Returns the ids of the scheduled steps. Rules are independent: several
    /// may match one message and all of them fire.
    pub async fn process(
        &self,
        tenant_id: &str,
        lead_id: &str,
        ctx: &TriggerContext<'_>,
    ) -> Result<Vec<i64>, LeadwiseError> {
        self.process_at(tenant_id, lead_id, ctx, Utc::now()).await
    }

    pub async fn process_at(
        &self,
        tenant_id: &str,
        lead_id: &str,
        ctx: &TriggerContext<'_>,
        fired_at: DateTime<Utc>,
    ) -> Result<Vec<i64>, LeadwiseError> {
        let rules = self.rules.active_conversation_rules(tenant_id).await?;

        let mut pending = Vec::new();
        for rule in rules.iter().filter(|r| trigger_matches(&r.trigger, ctx)) {
            if let Err(e) = rule.validate() {
                warn!(tenant_id, rule_id = %rule.id, error = %e, "skipping invalid conversation rule");
                continue;
            }
            debug!(tenant_id, lead_id, rule_id = %rule.id, steps = rule.steps.len(), "conversation rule matched");
            pending.extend(rule.steps.iter().enumerate().map(|(index, step)| {
                NewScheduledStep {
                    tenant_id: tenant_id.to_string(),
                    lead_id: lead_id.to_string(),
                    rule_id: rule.id.clone(),
                    step_index: index as i64,
                    template: step.template.clone(),
                    due_at: due_at(fired_at, step.delay_ms),
                }
            }));
        }
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let ids = self.steps.schedule(&pending).await?;
        info!(tenant_id, lead_id, scheduled = ids.len(), "conversation steps scheduled");
        if pending.iter().any(|s| s.due_at <= fired_at) {
            self.wake.notify_one();
        }
        Ok(ids)
    }
}
