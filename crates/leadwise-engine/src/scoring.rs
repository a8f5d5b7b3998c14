// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use leadwise_core::types::{AnalysisResult, ScoreDelta};
use leadwise_core::{LeadStore, LeadwiseError};
use tracing::debug;

/// Applies the interaction score of an analysed message to its lead.
pub struct ScoringUpdater {
    leads: Arc<dyn LeadStore>,
}

impl ScoringUpdater {
    pub fn new(leads: Arc<dyn LeadStore>) -> Self {
        Self { leads }
    }

    /// Returns the new cumulative score, or `None` when no rule applied.
    pub async fn apply_interaction_score(
        &self,
        lead_id: &str,
        analysis: &AnalysisResult,
    ) -> Result<Option<i64>, LeadwiseError> {
        let delta = ScoreDelta::from_analysis(analysis);
        if delta.is_empty() {
            return Ok(None);
        }
        let score = self.leads.apply_score(lead_id, &delta).await?;
        debug!(lead_id, delta = delta.delta, score, reasons = ?delta.reasons, "lead score updated");
        Ok(Some(score))
    }
}
