// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the conversation engine, the generic automation
//! processor, storage, and collaborator adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::LeadwiseError;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of collaborator behind an adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Transport,
    Classifier,
    Storage,
    Notifier,
    Sender,
}

// --- Leads ---

/// Lifecycle status of a lead.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum LeadStatus {
    New,
    Contacted,
    Active,
    Qualified,
    Converted,
    Lost,
    Inactive,
}

/// A tenant-scoped contact identified by phone number.
///
/// Serializes with camelCase keys because the serialized form is the context
/// object that message templates are rendered against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    /// UUID assigned on creation.
    pub id: String,
    /// Owning tenant; every query is scoped by it.
    pub tenant_id: String,
    /// Sender address with transport suffixes stripped; unique per tenant.
    pub phone_number: String,
    /// Transport push name, or the phone number when none was sent.
    pub name: String,
    pub status: LeadStatus,
    /// Cumulative score. Can go negative.
    pub score: i64,
    /// Channel the lead arrived through (e.g. "whatsapp").
    pub source: String,
    /// Coach set by `ASSIGN_LEAD_TO_COACH`.
    pub assigned_coach_id: Option<String>,
    /// Text of the message that created the lead.
    pub first_message: Option<String>,
    pub first_contact_at: DateTime<Utc>,
    pub last_contact_at: DateTime<Utc>,
    /// Inbound messages seen, including the first.
    pub message_count: i64,
    /// Negative messages since the last resolved escalation.
    pub negative_message_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Contact data used to create or touch a lead in a single atomic upsert.
#[derive(Debug, Clone)]
pub struct NewContact {
    pub tenant_id: String,
    pub phone_number: String,
    /// Used only when the lead is created; an existing name is kept.
    pub name: String,
    pub source: String,
    /// Score given to a newly created lead.
    pub initial_score: i64,
    pub first_message: String,
    /// Becomes `last_contact_at`, and `first_contact_at` on insert.
    pub contacted_at: DateTime<Utc>,
}

/// Result of a lead upsert: the current lead row and whether it was inserted.
#[derive(Debug, Clone)]
pub struct LeadUpsert {
    pub lead: Lead,
    /// True only for the call that inserted the row.
    pub created: bool,
}

// --- Messages ---

/// Content type of a conversation message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Image,
    Video,
    Document,
    Audio,
    VoiceNote,
    Sticker,
    Location,
    Unsupported,
}

/// Direction of a conversation message relative to the tenant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Canonical form of a raw inbound transport message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMessage {
    /// Transport message id; empty when the transport sent none.
    pub external_id: String,
    /// Sender phone number with transport suffixes stripped.
    pub sender: String,
    pub recipient: String,
    /// Text body, media caption, or a type label such as "Audio message".
    pub content: String,
    pub content_type: ContentType,
    /// Transport send time, or the receive time when that is implausible.
    pub timestamp: DateTime<Utc>,
    pub media_url: Option<String>,
    /// Display name the sender chose in WhatsApp.
    pub push_name: Option<String>,
    pub is_group: bool,
    pub is_status_broadcast: bool,
    /// Echo of a message the tenant's own session sent.
    pub from_me: bool,
}

/// Immutable record of one inbound or outbound unit of conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub tenant_id: String,
    pub lead_id: String,
    /// Transport id: inbound message id, or the send receipt id for outbound.
    pub external_id: Option<String>,
    pub sender: String,
    pub recipient: String,
    pub body: String,
    pub content_type: ContentType,
    pub direction: Direction,
    pub timestamp: DateTime<Utc>,
    pub media_url: Option<String>,
    /// True when generated by a rule step or action rather than a person.
    pub automated: bool,
}

/// Receipt returned by a transport or named sender after accepting a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    /// Id the transport or sender assigned to the message.
    pub message_id: String,
    pub accepted_at: DateTime<Utc>,
}

// --- Analysis ---

/// Message sentiment as reported by the classifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

/// Message urgency as reported by the classifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    High,
}

/// Classification of one message. Transient, never persisted on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub sentiment: Sentiment,
    /// Sentiment strength in `0.0..=1.0`.
    pub sentiment_score: f64,
    /// Free-form intent tag (purchase, booking, information, general, ...).
    pub intent: String,
    pub urgency: Urgency,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub confidence: f64,
}

impl AnalysisResult {
    /// The deterministic result used whenever the classifier fails.
    pub fn fallback() -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            sentiment_score: 0.5,
            intent: "general".to_string(),
            urgency: Urgency::Low,
            keywords: Vec::new(),
            confidence: 0.5,
        }
    }
}

/// Signed score change with one explanation per contributing rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDelta {
    pub delta: i64,
    pub reasons: Vec<String>,
}

impl ScoreDelta {
    /// Adds a contribution and its explanation.
    pub fn add(&mut self, points: i64, reason: &str) {
        self.delta += points;
        self.reasons.push(reason.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }

    /// Interaction score for one analysed message. Every rule that matches
    /// contributes; none exclude each other.
    pub fn from_analysis(analysis: &AnalysisResult) -> Self {
        let mut delta = Self::default();
        match analysis.sentiment {
            Sentiment::Positive => delta.add(5, "Positive message sentiment"),
            Sentiment::Negative => delta.add(-3, "Negative message sentiment"),
            Sentiment::Neutral => {}
        }
        match analysis.intent.as_str() {
            "purchase" | "booking" => delta.add(10, "High purchase intent"),
            "information" => delta.add(3, "Information seeking"),
            _ => {}
        }
        if analysis.urgency == Urgency::High {
            delta.add(8, "High urgency");
        }
        delta
    }
}

// --- Escalations ---

/// Why a conversation was handed off to a human.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    NegativeSentiment,
    UrgentKeyword,
    RepeatedNegativeMessages,
}

/// A pending human-handoff case. At most one exists per lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Escalation {
    pub tenant_id: String,
    pub lead_id: String,
    pub reason: EscalationReason,
    /// Human-readable detail (matched keyword, negative count, ...).
    pub detail: String,
    pub created_at: DateTime<Utc>,
    /// The message that triggered the handoff.
    pub message: NormalizedMessage,
    /// Classification of that message.
    pub analysis: AnalysisResult,
}

// --- Conversation rules ---

/// Symbolic trigger of a conversation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationTrigger {
    FirstMessage,
    NegativeSentiment,
    UrgentMessage,
    KeywordMatch { keywords: Vec<String> },
}

/// One delayed, templated message of a conversation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleStep {
    /// Offset from the moment the rule fired, not from the previous step.
    pub delay_ms: u64,
    pub template: String,
}

/// Tenant-scoped chat rule: trigger condition plus an ordered step list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRule {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub trigger: ConversationTrigger,
    /// Scheduled in order; each delay counts from the trigger.
    pub steps: Vec<RuleStep>,
    /// Inactive rules are kept but never fire.
    pub is_active: bool,
}

impl ConversationRule {
    /// Rejects steps delayed beyond [`MAX_STEP_DELAY_MS`].
    pub fn validate(&self) -> Result<(), LeadwiseError> {
        match self
            .steps
            .iter()
            .position(|step| step.delay_ms > MAX_STEP_DELAY_MS)
        {
            Some(index) => Err(LeadwiseError::InvalidInput(format!(
                "rule {}: step {index} delay {}ms exceeds the {MAX_STEP_DELAY_MS}ms limit",
                self.id, self.steps[index].delay_ms
            ))),
            None => Ok(()),
        }
    }
}

// --- Scheduled steps ---

/// Lifecycle of a durable scheduled step.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A step to be persisted for later delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScheduledStep {
    pub tenant_id: String,
    pub lead_id: String,
    pub rule_id: String,
    pub step_index: i64,
    pub template: String,
    pub due_at: DateTime<Utc>,
}

/// A persisted step as claimed by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledStep {
    /// Row id.
    pub id: i64,
    pub tenant_id: String,
    pub lead_id: String,
    pub rule_id: String,
    /// Position of the step within its rule.
    pub step_index: i64,
    /// Unrendered template; rendered against the lead at send time.
    pub template: String,
    /// Earliest instant the step may be sent. Pushed back on each retry.
    pub due_at: DateTime<Utc>,
    pub status: StepStatus,
    /// Failed send attempts so far.
    pub attempts: i64,
    pub max_attempts: i64,
    /// Error of the most recent failed attempt.
    pub last_error: Option<String>,
}

// --- Generic automation rules ---

/// Comparison operator of a declarative action condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConditionOperator {
    Eq,
    Ne,
    Gt,
    Lt,
}

/// A `field <operator> value` check against an event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted path into the event payload.
    pub field: String,
    #[serde(alias = "op")]
    pub operator: ConditionOperator,
    pub value: serde_json::Value,
}

/// One action of a persisted automation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAction {
    /// Registered action tag, e.g. `SEND_WHATSAPP`.
    #[serde(rename = "type")]
    pub action_type: String,
    /// Handler-specific settings; string values may be templates.
    #[serde(default)]
    pub config: serde_json::Value,
    /// All must hold for the action to run.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Persisted tenant-scoped rule binding a lifecycle event to actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationRule {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    /// Bus event name the rule listens for.
    pub trigger_event: String,
    pub actions: Vec<RuleAction>,
    pub is_active: bool,
}

/// A follow-up task created by an automation action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub tenant_id: String,
    /// Lead of the event that created the task, if it carried one.
    pub lead_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    /// Coach responsible; defaults to the lead's assigned coach.
    pub assignee: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Earliest stored instant, 0001-01-01T00:00:00.000Z.
const MIN_STORED_MILLIS: i64 = -62_135_596_800_000;

/// Latest stored instant, 9999-12-31T23:59:59.999Z.
const MAX_STORED_MILLIS: i64 = 253_402_300_799_999;

/// Longest offset a conversation step may carry: one leap year.
pub const MAX_STEP_DELAY_MS: u64 = 366 * 24 * 60 * 60 * 1000;

/// Latest instant a timestamp column can hold.
pub fn max_stored_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(MAX_STORED_MILLIS).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Earliest instant a timestamp column can hold.
pub fn min_stored_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(MIN_STORED_MILLIS).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Clamps `ts` into the four-digit-year range the columns hold.
pub fn clamp_timestamp(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.clamp(min_stored_timestamp(), max_stored_timestamp())
}

/// Formats a timestamp the way every table stores it.
///
/// The output is fixed width, so text comparison orders it chronologically.
/// Instants outside years 1..=9999 are clamped first.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    clamp_timestamp(*ts)
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}
