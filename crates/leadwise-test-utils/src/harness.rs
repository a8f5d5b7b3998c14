// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end tests.
//!
//! `TestHarness` assembles a complete engine over a temp SQLite database
//! with mock collaborators. `send_message()` drives the inbound pipeline;
//! `tick()` delivers due conversation steps.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use leadwise_ai::AnalysisClient;
use leadwise_config::model::{EscalationStoreKind, LeadwiseConfig};
use leadwise_core::types::{AnalysisResult, NormalizedMessage};
use leadwise_core::{LeadwiseError, OutboundSender};
use leadwise_engine::{Collaborators, Engine, PipelineOutcome, TickReport};
use leadwise_storage::SqliteStorage;
use tempfile::TempDir;

use crate::fixtures::{inbound_message, temp_storage_with_attempts};
use crate::mock_classifier::MockClassifier;
use crate::mock_notifier::{MockNotifier, MockSender};
use crate::mock_transport::MockTransport;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: LeadwiseConfig,
    analysis: AnalysisResult,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = LeadwiseConfig::default();
        config.scheduler.retry_backoff_ms = 0;
        Self {
            config,
            analysis: AnalysisResult::fallback(),
        }
    }

    /// Analysis the mock classifier returns for every message.
    pub fn with_analysis(mut self, analysis: AnalysisResult) -> Self {
        self.analysis = analysis;
        self
    }

    /// Keep pending escalations in memory instead of SQLite.
    pub fn with_memory_escalations(mut self) -> Self {
        self.config.escalation.store = EscalationStoreKind::Memory;
        self
    }

    pub fn with_config(mut self, edit: impl FnOnce(&mut LeadwiseConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, LeadwiseError> {
        let (storage, temp_dir) =
            temp_storage_with_attempts(self.config.scheduler.max_attempts).await?;

        let transport = Arc::new(MockTransport::new());
        let classifier = Arc::new(MockClassifier::new(self.analysis));
        let notifier = Arc::new(MockNotifier::new());
        let email = Arc::new(MockSender::new(leadwise_notify::EMAIL));
        let sms = Arc::new(MockSender::new(leadwise_notify::SMS));

        let senders: Vec<Arc<dyn OutboundSender>> = vec![email.clone(), sms.clone()];
        let engine = Engine::build(
            &self.config,
            storage.clone(),
            Collaborators {
                transport: transport.clone(),
                analysis: AnalysisClient::new(classifier.clone(), Duration::from_secs(2)),
                notifier: notifier.clone(),
                senders,
            },
        );

        Ok(TestHarness {
            engine,
            storage,
            transport,
            classifier,
            notifier,
            email,
            sms,
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete engine wired to mocks.
pub struct TestHarness {
    pub engine: Engine,
    pub storage: Arc<SqliteStorage>,
    pub transport: Arc<MockTransport>,
    pub classifier: Arc<MockClassifier>,
    pub notifier: Arc<MockNotifier>,
    pub email: Arc<MockSender>,
    pub sms: Arc<MockSender>,
    pub config: LeadwiseConfig,
    _temp_dir: TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default configuration and a neutral classifier.
    pub async fn new() -> Result<Self, LeadwiseError> {
        Self::builder().build().await
    }

    /// Runs a text message from `phone` through the inbound pipeline.
    pub async fn send_message(
        &self,
        tenant_id: &str,
        phone: &str,
        text: &str,
    ) -> Result<PipelineOutcome, LeadwiseError> {
        self.send(tenant_id, inbound_message(phone, text)).await
    }

    pub async fn send(
        &self,
        tenant_id: &str,
        message: NormalizedMessage,
    ) -> Result<PipelineOutcome, LeadwiseError> {
        self.engine.pipeline.handle(tenant_id, message).await
    }

    /// Delivers every step due now.
    pub async fn tick(&self) -> Result<TickReport, LeadwiseError> {
        self.engine.dispatcher.tick(Utc::now()).await
    }

    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<TickReport, LeadwiseError> {
        self.engine.dispatcher.tick(now).await
    }
}
