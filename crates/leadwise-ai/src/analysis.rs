// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message analysis that never fails.
//!
//! Any classifier error, timeout, or missing classifier yields
//! [`AnalysisResult::fallback`], so callers never branch on errors here.

use std::sync::Arc;
use std::time::Duration;

use leadwise_core::Classifier;
use leadwise_core::traits::classifier::SENTIMENT_INTENT_URGENCY;
use leadwise_core::types::AnalysisResult;
use tracing::{debug, warn};

/// Wraps an optional classifier with a bounded wait and a deterministic fallback.
#[derive(Clone)]
pub struct AnalysisClient {
    classifier: Option<Arc<dyn Classifier>>,
    timeout: Duration,
}

impl AnalysisClient {
    pub fn new(classifier: Arc<dyn Classifier>, timeout: Duration) -> Self {
        Self {
            classifier: Some(classifier),
            timeout,
        }
    }

    /// A client with no classifier; every analysis is the fallback.
    pub fn disabled() -> Self {
        Self {
            classifier: None,
            timeout: Duration::ZERO,
        }
    }

    /// The underlying classifier, for copy generation.
    pub fn classifier(&self) -> Option<&Arc<dyn Classifier>> {
        self.classifier.as_ref()
    }

    /// Classifies `text` for sentiment, intent, and urgency.
    pub async fn analyze(&self, text: &str) -> AnalysisResult {
        let Some(classifier) = &self.classifier else {
            debug!("no classifier configured, using fallback analysis");
            return AnalysisResult::fallback();
        };

        match tokio::time::timeout(
            self.timeout,
            classifier.classify(text, SENTIMENT_INTENT_URGENCY),
        )
        .await
        {
            Ok(Ok(result)) => {
                debug!(
                    sentiment = %result.sentiment,
                    intent = %result.intent,
                    urgency = %result.urgency,
                    "message analyzed"
                );
                result
            }
            Ok(Err(e)) => {
                warn!(error = %e, "classifier failed, using fallback analysis");
                AnalysisResult::fallback()
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "classifier timed out, using fallback analysis"
                );
                AnalysisResult::fallback()
            }
        }
    }
}
