// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Actions backed by the AI collaborator.

use async_trait::async_trait;
use leadwise_core::LeadwiseError;
use leadwise_core::types::ScoreDelta;
use serde_json::{Value, json};
use tracing::debug;

use super::{
    AI_DETECT_SENTIMENT, AI_GENERATE_COPY, AI_SCORE_LEAD, ActionContext, ActionDeps,
    ActionHandler, ActionOutcome, config_str, payload_text,
};
use crate::template::render;

/// Where the text to analyse comes from when `textField` is not configured.
const DEFAULT_TEXT_FIELD: &str = "message.content";

/// Text to analyse: `text` (a template) or the payload value at `textField`.
fn source_text(config: &Value, payload: &Value) -> Option<String> {
    if let Some(text) = config_str(config, "text") {
        return Some(render(text, payload));
    }
    let field = config_str(config, "textField").unwrap_or(DEFAULT_TEXT_FIELD);
    payload_text(payload, field)
}

/// `AI_GENERATE_COPY`: generates copy from a templated `prompt`.
pub struct AiGenerateCopy {
    deps: ActionDeps,
}

impl AiGenerateCopy {
    pub fn new(deps: ActionDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl ActionHandler for AiGenerateCopy {
    fn action_type(&self) -> &'static str {
        AI_GENERATE_COPY
    }

    async fn execute(
        &self,
        config: &Value,
        ctx: &ActionContext,
    ) -> Result<ActionOutcome, LeadwiseError> {
        let Some(prompt) = config_str(config, "prompt") else {
            return Ok(ActionOutcome::skipped("no prompt configured"));
        };
        let Some(classifier) = self.deps.analysis.classifier() else {
            return Ok(ActionOutcome::skipped("no AI classifier configured"));
        };
        let text = classifier.generate(&render(prompt, &ctx.payload)).await?;
        debug!(chars = text.len(), "copy generated");
        Ok(ActionOutcome::Executed(Some(json!({ "text": text }))))
    }
}

/// `AI_DETECT_SENTIMENT`: classifies text from the event.
pub struct AiDetectSentiment {
    deps: ActionDeps,
}

impl AiDetectSentiment {
    pub fn new(deps: ActionDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl ActionHandler for AiDetectSentiment {
    fn action_type(&self) -> &'static str {
        AI_DETECT_SENTIMENT
    }

    async fn execute(
        &self,
        config: &Value,
        ctx: &ActionContext,
    ) -> Result<ActionOutcome, LeadwiseError> {
        let Some(text) = source_text(config, &ctx.payload) else {
            return Ok(ActionOutcome::skipped("no text to analyse"));
        };
        let analysis = self.deps.analysis.analyze(&text).await;
        let value = serde_json::to_value(&analysis)
            .map_err(|e| LeadwiseError::Internal(format!("failed to encode analysis: {e}")))?;
        Ok(ActionOutcome::Executed(Some(value)))
    }
}

/// `AI_SCORE_LEAD`: classifies text from the event and applies the
/// interaction score to the event's lead.
pub struct AiScoreLead {
    deps: ActionDeps,
}

impl AiScoreLead {
    pub fn new(deps: ActionDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl ActionHandler for AiScoreLead {
    fn action_type(&self) -> &'static str {
        AI_SCORE_LEAD
    }

    async fn execute(
        &self,
        config: &Value,
        ctx: &ActionContext,
    ) -> Result<ActionOutcome, LeadwiseError> {
        let Some(lead_id) = &ctx.lead_id else {
            return Ok(ActionOutcome::skipped("event has no lead id"));
        };
        let Some(text) = source_text(config, &ctx.payload) else {
            return Ok(ActionOutcome::skipped("no text to analyse"));
        };

        let analysis = self.deps.analysis.analyze(&text).await;
        let delta = ScoreDelta::from_analysis(&analysis);
        if delta.is_empty() {
            return Ok(ActionOutcome::Executed(Some(json!({ "delta": 0 }))));
        }
        let score = self.deps.leads.apply_score(lead_id, &delta).await?;
        Ok(ActionOutcome::Executed(Some(json!({
            "delta": delta.delta,
            "score": score,
            "reasons": delta.reasons,
        }))))
    }
}
