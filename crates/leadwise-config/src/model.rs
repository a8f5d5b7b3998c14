// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key fails
//! at startup instead of silently falling back to a default.

use serde::{Deserialize, Serialize};

/// Top-level Leadwise configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LeadwiseConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// WhatsApp session gateway and webhook settings.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// AI classifier endpoint settings.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Lead scoring settings.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Human handoff thresholds.
    #[serde(default)]
    pub escalation: EscalationConfig,

    /// Durable step dispatcher settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Coach notification and named sender endpoints.
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Generic automation processor settings.
    #[serde(default)]
    pub processor: ProcessorConfig,
}

/// Service identity and logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Instance name, used in logs and health output.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "leadwise".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journaling.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("leadwise").join("leadwise.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("leadwise.db"))
        .display()
        .to_string()
}

fn default_true() -> bool {
    true
}

/// WhatsApp session gateway and inbound webhook configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    /// Base URL of the session gateway that owns the tenants' WhatsApp sessions.
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Bearer token for the session gateway.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Shared secret for inbound webhook HMAC signatures. `None` disables
    /// signature checks.
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Address the webhook listener binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port the webhook listener binds to.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            api_token: None,
            webhook_secret: None,
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_gateway_url() -> String {
    "http://127.0.0.1:3001".to_string()
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

/// AI classifier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Classification endpoint. `None` makes every analysis use the fallback.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// API key sent as a bearer token.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Bounded wait before falling back, in milliseconds.
    #[serde(default = "default_classifier_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_ms: default_classifier_timeout_ms(),
        }
    }
}

fn default_classifier_timeout_ms() -> u64 {
    10_000
}

/// Lead scoring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    /// Score given to a lead created from a first inbound message.
    #[serde(default = "default_initial_score")]
    pub initial_score: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            initial_score: default_initial_score(),
        }
    }
}

fn default_initial_score() -> i64 {
    10
}

/// Where pending escalations are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationStoreKind {
    /// Shared SQLite table (consistent across instances on one database).
    Sqlite,
    /// Process-local map, for single-instance deployments.
    Memory,
}

/// Human handoff thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EscalationConfig {
    /// Negative messages with a sentiment score below this escalate.
    #[serde(default = "default_negative_sentiment_threshold")]
    pub negative_sentiment_threshold: f64,

    /// Case-insensitive substrings that always escalate.
    #[serde(default = "default_urgent_keywords")]
    pub urgent_keywords: Vec<String>,

    /// Stored negative-message count at which a lead escalates.
    #[serde(default = "default_negative_message_threshold")]
    pub negative_message_threshold: i64,

    #[serde(default = "default_escalation_store")]
    pub store: EscalationStoreKind,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            negative_sentiment_threshold: default_negative_sentiment_threshold(),
            urgent_keywords: default_urgent_keywords(),
            negative_message_threshold: default_negative_message_threshold(),
            store: default_escalation_store(),
        }
    }
}

fn default_negative_sentiment_threshold() -> f64 {
    0.6
}

fn default_urgent_keywords() -> Vec<String> {
    ["urgent", "emergency", "help", "problem", "issue"]
        .iter()
        .map(|k| k.to_string())
        .collect()
}

fn default_negative_message_threshold() -> i64 {
    3
}

fn default_escalation_store() -> EscalationStoreKind {
    EscalationStoreKind::Sqlite
}

/// Durable step dispatcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// How often to poll for due steps, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum steps claimed per poll.
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Attempts before a step is marked failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i64,

    /// How long a claimed step stays locked before another poll may reclaim it.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    /// Delay before a failed step is retried; doubles with each attempt.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            lock_timeout_secs: default_lock_timeout_secs(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_batch_size() -> i64 {
    32
}

fn default_max_attempts() -> i64 {
    3
}

fn default_lock_timeout_secs() -> u64 {
    300
}

fn default_retry_backoff_ms() -> u64 {
    30_000
}

/// Notification and named sender endpoints. Unset endpoints fall back to
/// log-only delivery.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationConfig {
    /// Coach alert webhook (escalations, SEND_NOTIFICATION).
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Email relay webhook used by CREATE_EMAIL_MESSAGE.
    #[serde(default)]
    pub email_webhook_url: Option<String>,

    /// SMS relay webhook used by CREATE_SMS_MESSAGE.
    #[serde(default)]
    pub sms_webhook_url: Option<String>,
}

/// Generic automation processor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessorConfig {
    /// Number of recent event ids remembered to drop redeliveries.
    #[serde(default = "default_dedupe_window")]
    pub dedupe_window: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            dedupe_window: default_dedupe_window(),
        }
    }
}

fn default_dedupe_window() -> usize {
    1024
}
