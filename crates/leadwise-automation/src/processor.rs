// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event-driven automation processor.
//!
//! For each bus event, loads the tenant's active rules bound to the event
//! name and runs their actions in order. An action runs only when all of its
//! conditions hold against the payload. Failed and unknown actions are
//! logged and recorded; they never stop the remaining actions or rules.
//! Events are handled concurrently; one event's rules run sequentially.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use leadwise_bus::BusEvent;
use leadwise_core::types::{AutomationRule, RuleAction};
use leadwise_core::{AutomationRuleStore, LeadStore, LeadwiseError};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::actions::{ActionContext, ActionOutcome, ActionRegistry};
use crate::conditions::all_hold;

/// What happened to one action of one rule.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    Executed(Option<Value>),
    Skipped(String),
    ConditionsNotMet,
    UnknownType,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ActionReport {
    pub rule_id: String,
    pub action_index: usize,
    pub action_type: String,
    pub result: ActionResult,
}

/// Outcome of handling one event.
#[derive(Debug, Clone, Default)]
pub struct EventReport {
    pub event_id: String,
    pub event_type: String,
    /// The event id was seen recently and nothing ran.
    pub duplicate: bool,
    pub rules_matched: usize,
    pub actions: Vec<ActionReport>,
}

impl EventReport {
    pub fn executed(&self) -> usize {
        self.count(|r| matches!(r, ActionResult::Executed(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|r| matches!(r, ActionResult::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&ActionResult) -> bool) -> usize {
        self.actions.iter().filter(|a| pred(&a.result)).count()
    }
}

/// Remembers the most recent event ids, evicting the oldest.
struct DedupeWindow {
    capacity: usize,
    order: VecDeque<String>,
    ids: HashSet<String>,
}

impl DedupeWindow {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
        }
    }

    /// Records `id`; false when it is already in the window.
    fn insert(&mut self, id: &str) -> bool {
        if self.capacity == 0 {
            return true;
        }
        if self.ids.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.ids.remove(&oldest);
        }
        self.order.push_back(id.to_string());
        self.ids.insert(id.to_string());
        true
    }
}

pub struct AutomationProcessor {
    rules: Arc<dyn AutomationRuleStore>,
    leads: Arc<dyn LeadStore>,
    registry: Arc<ActionRegistry>,
    seen: Mutex<DedupeWindow>,
}

impl AutomationProcessor {
    /// `dedupe_window` is how many recent event ids are remembered; 0 disables
    /// deduplication.
    pub fn new(
        rules: Arc<dyn AutomationRuleStore>,
        leads: Arc<dyn LeadStore>,
        registry: Arc<ActionRegistry>,
        dedupe_window: usize,
    ) -> Self {
        Self {
            rules,
            leads,
            registry,
            seen: Mutex::new(DedupeWindow::new(dedupe_window)),
        }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    fn first_delivery(&self, event_id: &str) -> bool {
        match self.seen.lock() {
            Ok(mut seen) => seen.insert(event_id),
            Err(poisoned) => poisoned.into_inner().insert(event_id),
        }
    }

    /// Flattened payload plus the current lead snapshot under `lead`.
    async fn build_payload(&self, event: &BusEvent) -> Value {
        let mut payload = event.to_json();
        let Some(lead_id) = event.lead_id() else {
            return payload;
        };
        match self.leads.get_lead(lead_id).await {
            Ok(Some(lead)) => match serde_json::to_value(&lead) {
                Ok(snapshot) => {
                    if let Value::Object(map) = &mut payload {
                        map.insert("lead".to_string(), snapshot);
                    }
                }
                Err(e) => warn!(error = %e, lead_id, "failed to encode lead snapshot"),
            },
            Ok(None) => debug!(lead_id, "event references unknown lead"),
            Err(e) => warn!(error = %e, lead_id, "failed to load lead for event"),
        }
        payload
    }

    /// Runs every matching rule for one event.
    pub async fn handle_event(&self, event: &BusEvent) -> Result<EventReport, LeadwiseError> {
        let mut report = EventReport {
            event_id: event.id.clone(),
            event_type: event.name().to_string(),
            ..EventReport::default()
        };

        if !self.first_delivery(&event.id) {
            debug!(event_id = %event.id, event_type = %report.event_type, "duplicate event dropped");
            report.duplicate = true;
            return Ok(report);
        }

        let rules = self
            .rules
            .active_rules_for_event(&event.tenant_id, event.name())
            .await?;
        report.rules_matched = rules.len();
        if rules.is_empty() {
            return Ok(report);
        }

        let ctx = ActionContext {
            tenant_id: event.tenant_id.clone(),
            event_type: event.name().to_string(),
            lead_id: event.lead_id().map(str::to_string),
            payload: self.build_payload(event).await,
        };

        for rule in &rules {
            for (index, action) in rule.actions.iter().enumerate() {
                let result = self.run_action(rule, action, &ctx).await;
                report.actions.push(ActionReport {
                    rule_id: rule.id.clone(),
                    action_index: index,
                    action_type: action.action_type.clone(),
                    result,
                });
            }
        }

        info!(
            event_type = %report.event_type,
            tenant_id = %event.tenant_id,
            rules = report.rules_matched,
            executed = report.executed(),
            failed = report.failed(),
            "automation rules processed"
        );
        Ok(report)
    }

    async fn run_action(
        &self,
        rule: &AutomationRule,
        action: &RuleAction,
        ctx: &ActionContext,
    ) -> ActionResult {
        if !all_hold(&action.conditions, &ctx.payload) {
            debug!(rule_id = %rule.id, action_type = %action.action_type, "conditions not met");
            return ActionResult::ConditionsNotMet;
        }

        let Some(handler) = self.registry.get(&action.action_type) else {
            warn!(
                rule_id = %rule.id,
                action_type = %action.action_type,
                "unknown action type, skipping"
            );
            return ActionResult::UnknownType;
        };

        match handler.execute(&action.config, ctx).await {
            Ok(ActionOutcome::Executed(output)) => ActionResult::Executed(output),
            Ok(ActionOutcome::Skipped(reason)) => {
                warn!(
                    rule_id = %rule.id,
                    action_type = %action.action_type,
                    lead_id = ctx.lead_id.as_deref().unwrap_or_default(),
                    reason = %reason,
                    "action skipped"
                );
                ActionResult::Skipped(reason)
            }
            Err(e) => {
                error!(
                    error = %e,
                    rule_id = %rule.id,
                    event_type = %ctx.event_type,
                    action_type = %action.action_type,
                    lead_id = ctx.lead_id.as_deref().unwrap_or_default(),
                    "action failed"
                );
                ActionResult::Failed(e.to_string())
            }
        }
    }

    /// Handles events from `events` until cancelled or the bus closes. Each
    /// event runs in its own task; in-flight events finish before returning.
    pub async fn run(
        self: Arc<Self>,
        mut events: broadcast::Receiver<BusEvent>,
        cancel: CancellationToken,
    ) {
        info!("automation processor running");
        let tracker = TaskTracker::new();

        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => {
                        let processor = Arc::clone(&self);
                        tracker.spawn(async move {
                            if let Err(e) = processor.handle_event(&event).await {
                                error!(
                                    error = %e,
                                    event_type = %event.name(),
                                    tenant_id = %event.tenant_id,
                                    "failed to process event"
                                );
                            }
                        });
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "automation processor lagged behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping automation processor");
                    break;
                }
            }
        }

        tracker.close();
        tracker.wait().await;
        info!("automation processor stopped");
    }
}
