// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repository traits for shared state.
//!
//! Every piece of state the engine reads or mutates lives behind one of these
//! traits so that multiple service instances can share a datastore.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::LeadwiseError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    AutomationRule, ConversationRule, Escalation, Lead, LeadStatus, LeadUpsert, MessageRecord,
    NewContact, NewScheduledStep, ScheduledStep, ScoreDelta, StepStatus, Task,
};

/// Lifecycle of a storage backend.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), LeadwiseError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), LeadwiseError>;
}

/// Lead records keyed by id and by (tenant, phone).
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Creates the lead or, if (tenant, phone) exists, bumps its activity
    /// fields. Must be atomic under concurrent first messages.
    async fn upsert_contact(&self, contact: &NewContact) -> Result<LeadUpsert, LeadwiseError>;

    async fn get_lead(&self, lead_id: &str) -> Result<Option<Lead>, LeadwiseError>;

    async fn find_by_phone(
        &self,
        tenant_id: &str,
        phone_number: &str,
    ) -> Result<Option<Lead>, LeadwiseError>;

    async fn set_status(&self, lead_id: &str, status: LeadStatus) -> Result<(), LeadwiseError>;

    async fn assign_coach(&self, lead_id: &str, coach_id: &str) -> Result<(), LeadwiseError>;

    /// Atomically adds `delta` to the score and records its explanation
    /// trail. Returns the new cumulative score.
    async fn apply_score(&self, lead_id: &str, delta: &ScoreDelta) -> Result<i64, LeadwiseError>;

    /// Atomically increments the negative-message counter, returning the new value.
    async fn increment_negative_count(&self, lead_id: &str) -> Result<i64, LeadwiseError>;

    async fn reset_negative_count(&self, lead_id: &str) -> Result<(), LeadwiseError>;
}

/// Append-only conversation message log.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert_message(&self, message: &MessageRecord) -> Result<(), LeadwiseError>;

    /// Whether an inbound message with this transport id was already logged
    /// for the tenant.
    async fn has_inbound_message(
        &self,
        tenant_id: &str,
        external_id: &str,
    ) -> Result<bool, LeadwiseError>;

    /// Most recent `limit` messages for the lead, newest first.
    async fn recent_messages(
        &self,
        tenant_id: &str,
        lead_id: &str,
        limit: i64,
    ) -> Result<Vec<MessageRecord>, LeadwiseError>;
}

/// Pending human-handoff cases, at most one per lead.
#[async_trait]
pub trait EscalationStore: Send + Sync {
    /// Inserts the escalation, replacing any existing one for the same lead.
    async fn put(&self, escalation: &Escalation) -> Result<(), LeadwiseError>;

    async fn get(&self, lead_id: &str) -> Result<Option<Escalation>, LeadwiseError>;

    /// Pending escalations of a tenant, oldest first.
    async fn list(&self, tenant_id: &str) -> Result<Vec<Escalation>, LeadwiseError>;

    /// Removes and returns the escalation for the lead, if any.
    async fn remove(&self, lead_id: &str) -> Result<Option<Escalation>, LeadwiseError>;
}

/// Per-tenant conversation rules.
#[async_trait]
pub trait ConversationRuleStore: Send + Sync {
    async fn save_conversation_rule(&self, rule: &ConversationRule) -> Result<(), LeadwiseError>;

    async fn active_conversation_rules(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<ConversationRule>, LeadwiseError>;

    /// Number of rules (active or not) the tenant has.
    async fn count_conversation_rules(&self, tenant_id: &str) -> Result<i64, LeadwiseError>;
}

/// Persisted generic automation rules.
#[async_trait]
pub trait AutomationRuleStore: Send + Sync {
    async fn save_automation_rule(&self, rule: &AutomationRule) -> Result<(), LeadwiseError>;

    /// Active rules of the tenant bound to `event_name`.
    async fn active_rules_for_event(
        &self,
        tenant_id: &str,
        event_name: &str,
    ) -> Result<Vec<AutomationRule>, LeadwiseError>;
}

/// Durable delayed-job queue for conversation rule steps.
#[async_trait]
pub trait StepQueue: Send + Sync {
    /// Persists the steps, returning their ids in input order.
    async fn schedule(&self, steps: &[NewScheduledStep]) -> Result<Vec<i64>, LeadwiseError>;

    /// Claims up to `limit` pending steps due at or before `now`, locking
    /// them for `lock_for`.
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
        lock_for: Duration,
    ) -> Result<Vec<ScheduledStep>, LeadwiseError>;

    async fn complete(&self, step_id: i64) -> Result<(), LeadwiseError>;

    /// Records a failed attempt. With `retry_at` and attempts left the step
    /// becomes due again at that time; `None` fails it permanently. Returns
    /// the resulting status.
    async fn fail(
        &self,
        step_id: i64,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<StepStatus, LeadwiseError>;

    /// Returns steps whose lock expired before `now` to pending. Returns how
    /// many were released.
    async fn release_expired(&self, now: DateTime<Utc>) -> Result<i64, LeadwiseError>;
}

/// Follow-up tasks created by automations.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, task: &Task) -> Result<(), LeadwiseError>;

    /// Tasks of a tenant, newest first.
    async fn list_tasks(&self, tenant_id: &str) -> Result<Vec<Task>, LeadwiseError>;
}
