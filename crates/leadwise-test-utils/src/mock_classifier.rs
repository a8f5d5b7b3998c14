// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock AI classifier with a configurable answer.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use leadwise_core::types::{AdapterType, AnalysisResult, HealthStatus};
use leadwise_core::{Classifier, LeadwiseError, PluginAdapter};
use tokio::sync::Mutex;

/// Returns a preset analysis for every text, or a per-text override.
pub struct MockClassifier {
    default: Mutex<AnalysisResult>,
    overrides: Mutex<Vec<(String, AnalysisResult)>>,
    generated: Mutex<String>,
    failing: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl MockClassifier {
    /// Answers every classification with `analysis`.
    pub fn new(analysis: AnalysisResult) -> Self {
        Self {
            default: Mutex::new(analysis),
            overrides: Mutex::new(Vec::new()),
            generated: Mutex::new("Generated copy".to_string()),
            failing: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the answer for texts no override matches.
    pub async fn set_default(&self, analysis: AnalysisResult) {
        *self.default.lock().await = analysis;
    }

    /// Answers texts containing `needle` (case-insensitive) with `analysis`.
    pub async fn answer_for(&self, needle: &str, analysis: AnalysisResult) {
        self.overrides
            .lock()
            .await
            .push((needle.to_lowercase(), analysis));
    }

    pub async fn set_generated(&self, text: &str) {
        *self.generated.lock().await = text.to_string();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Texts passed to `classify` and prompts passed to `generate`, in order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new(AnalysisResult::fallback())
    }
}

#[async_trait]
impl PluginAdapter for MockClassifier {
    fn name(&self) -> &str {
        "mock-classifier"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Classifier
    }

    async fn health_check(&self) -> Result<HealthStatus, LeadwiseError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LeadwiseError> {
        Ok(())
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(&self, text: &str, _task_hint: &str) -> Result<AnalysisResult, LeadwiseError> {
        self.calls.lock().await.push(text.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Err(LeadwiseError::classifier("mock classifier failure"));
        }
        let lowered = text.to_lowercase();
        let overrides = self.overrides.lock().await;
        if let Some((_, analysis)) = overrides.iter().find(|(n, _)| lowered.contains(n.as_str())) {
            return Ok(analysis.clone());
        }
        Ok(self.default.lock().await.clone())
    }

    async fn generate(&self, prompt: &str) -> Result<String, LeadwiseError> {
        self.calls.lock().await.push(prompt.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Err(LeadwiseError::classifier("mock classifier failure"));
        }
        Ok(self.generated.lock().await.clone())
    }
}
