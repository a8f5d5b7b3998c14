// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External AI classification and copy generation.

use async_trait::async_trait;

use crate::error::LeadwiseError;
use crate::traits::adapter::PluginAdapter;
use crate::types::AnalysisResult;

/// Task hint sent with every message classification request.
pub const SENTIMENT_INTENT_URGENCY: &str = "sentiment_intent_urgency";

/// AI collaborator used for message analysis and generated copy.
#[async_trait]
pub trait Classifier: PluginAdapter {
    /// Classifies `text` for the given task shape.
    async fn classify(&self, text: &str, task_hint: &str) -> Result<AnalysisResult, LeadwiseError>;

    /// Generates marketing or reply copy from a prompt.
    async fn generate(&self, prompt: &str) -> Result<String, LeadwiseError>;
}
