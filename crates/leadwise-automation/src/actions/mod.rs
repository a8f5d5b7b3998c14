// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Action handlers and the registry that maps action-type tags to them.
//!
//! New action types are added by registering another [`ActionHandler`];
//! the processor never matches on type names itself.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use leadwise_ai::AnalysisClient;
use leadwise_bus::EventBus;
use leadwise_core::{
    LeadStore, LeadwiseError, MessageStore, Notifier, OutboundSender, TaskStore, Transport,
};
use serde_json::Value;

use crate::template::lookup;

pub mod ai;
pub mod messaging;
pub mod records;

pub const SEND_WHATSAPP: &str = "SEND_WHATSAPP";
pub const CREATE_TASK: &str = "CREATE_TASK";
pub const UPDATE_LEAD_STATUS: &str = "UPDATE_LEAD_STATUS";
pub const ASSIGN_LEAD_TO_COACH: &str = "ASSIGN_LEAD_TO_COACH";
pub const CREATE_EMAIL_MESSAGE: &str = "CREATE_EMAIL_MESSAGE";
pub const CREATE_SMS_MESSAGE: &str = "CREATE_SMS_MESSAGE";
pub const SEND_NOTIFICATION: &str = "SEND_NOTIFICATION";
pub const AI_GENERATE_COPY: &str = "AI_GENERATE_COPY";
pub const AI_DETECT_SENTIMENT: &str = "AI_DETECT_SENTIMENT";
pub const AI_SCORE_LEAD: &str = "AI_SCORE_LEAD";

/// What an action did.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The action ran; some actions report a result value.
    Executed(Option<Value>),
    /// Required data was missing or a precondition did not hold.
    Skipped(String),
}

impl ActionOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }
}

/// The event an action runs for.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub tenant_id: String,
    pub event_type: String,
    pub lead_id: Option<String>,
    /// Flattened event payload, enriched with the lead snapshot under `lead`.
    pub payload: Value,
}

/// Executes one action type.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// The action-type tag this handler is registered under.
    fn action_type(&self) -> &'static str;

    /// Runs the action. Missing data is `Ok(Skipped)`, collaborator
    /// failures are `Err`.
    async fn execute(
        &self,
        config: &Value,
        ctx: &ActionContext,
    ) -> Result<ActionOutcome, LeadwiseError>;
}

/// Collaborators the built-in actions need.
#[derive(Clone)]
pub struct ActionDeps {
    pub transport: Arc<dyn Transport>,
    pub leads: Arc<dyn LeadStore>,
    pub messages: Arc<dyn MessageStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub notifier: Arc<dyn Notifier>,
    pub senders: Vec<Arc<dyn OutboundSender>>,
    pub analysis: AnalysisClient,
    pub bus: EventBus,
}

impl ActionDeps {
    /// The named sender for `channel`, if one is registered.
    pub fn sender(&self, channel: &str) -> Option<Arc<dyn OutboundSender>> {
        self.senders.iter().find(|s| s.channel() == channel).cloned()
    }
}

/// Action handlers indexed by action-type tag.
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// A registry holding every built-in action.
    pub fn with_builtins(deps: ActionDeps) -> Self {
        let mut registry = Self::new();
        register_builtins(&mut registry, deps);
        registry
    }

    /// Registers a handler under its `action_type()`, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) {
        self.handlers
            .insert(handler.action_type().to_string(), handler);
    }

    pub fn get(&self, action_type: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(action_type).cloned()
    }

    /// Registered action types, sorted.
    pub fn action_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registers all ten built-in actions.
pub fn register_builtins(registry: &mut ActionRegistry, deps: ActionDeps) {
    use ai::{AiDetectSentiment, AiGenerateCopy, AiScoreLead};
    use messaging::{ChannelMessage, SendNotification, SendWhatsApp};
    use records::{AssignLeadToCoach, CreateTask, UpdateLeadStatus};

    registry.register(Arc::new(SendWhatsApp::new(deps.clone())));
    registry.register(Arc::new(CreateTask::new(deps.clone())));
    registry.register(Arc::new(UpdateLeadStatus::new(deps.clone())));
    registry.register(Arc::new(AssignLeadToCoach::new(deps.clone())));
    registry.register(Arc::new(ChannelMessage::email(deps.clone())));
    registry.register(Arc::new(ChannelMessage::sms(deps.clone())));
    registry.register(Arc::new(SendNotification::new(deps.clone())));
    registry.register(Arc::new(AiGenerateCopy::new(deps.clone())));
    registry.register(Arc::new(AiDetectSentiment::new(deps.clone())));
    registry.register(Arc::new(AiScoreLead::new(deps)));
}

/// Non-empty string at `key` in an action config.
pub(crate) fn config_str<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
    config
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// The message body template, accepted under `template`, `message`, or `body`.
pub(crate) fn message_template(config: &Value) -> Option<&str> {
    config_str(config, "template")
        .or_else(|| config_str(config, "message"))
        .or_else(|| config_str(config, "body"))
}

/// A scalar payload value as text.
pub(crate) fn payload_text(payload: &Value, path: &str) -> Option<String> {
    match lookup(payload, path)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl ActionHandler for Echo {
        fn action_type(&self) -> &'static str {
            "ECHO"
        }

        async fn execute(
            &self,
            config: &Value,
            _ctx: &ActionContext,
        ) -> Result<ActionOutcome, LeadwiseError> {
            Ok(ActionOutcome::Executed(Some(config.clone())))
        }
    }

    #[tokio::test]
    async fn registry_dispatches_by_tag() {
        let mut registry = ActionRegistry::new();
        assert!(registry.is_empty());
        registry.register(Arc::new(Echo));
        assert_eq!(registry.action_types(), vec!["ECHO"]);

        let ctx = ActionContext {
            tenant_id: "t".into(),
            event_type: "lead_created".into(),
            lead_id: None,
            payload: json!({}),
        };
        let handler = registry.get("ECHO").unwrap();
        let outcome = handler.execute(&json!({"x": 1}), &ctx).await.unwrap();
        assert_eq!(outcome, ActionOutcome::Executed(Some(json!({"x": 1}))));
        assert!(registry.get("UNKNOWN").is_none());
    }

    #[test]
    fn config_helpers() {
        let config = json!({"message": "  Hi  ", "template": "", "n": 3});
        assert_eq!(message_template(&config), Some("Hi"));
        assert_eq!(config_str(&config, "n"), None);

        let payload = json!({"lead": {"phoneNumber": "1555", "score": 12, "name": " "}});
        assert_eq!(payload_text(&payload, "lead.phoneNumber").as_deref(), Some("1555"));
        assert_eq!(payload_text(&payload, "lead.score").as_deref(), Some("12"));
        assert_eq!(payload_text(&payload, "lead.name"), None);
    }
}
