// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp conversation automation engine.
//!
//! [`Engine::build`] wires the inbound pipeline, the step dispatcher, the
//! generic automation processor, and the escalation queue around one storage
//! backend and the external collaborators. [`Engine::spawn`] starts their
//! long-running loops.

pub mod conversation;
pub mod dispatcher;
pub mod escalation;
pub mod pipeline;
pub mod resolver;
pub mod rules;
pub mod scoring;

use std::sync::Arc;

use leadwise_ai::AnalysisClient;
use leadwise_automation::{ActionDeps, ActionRegistry, AutomationProcessor};
use leadwise_bus::EventBus;
use leadwise_config::model::{EscalationStoreKind, LeadwiseConfig};
use leadwise_core::{EscalationStore, Notifier, OutboundSender, Transport};
use leadwise_storage::SqliteStorage;
use leadwise_whatsapp::InboundEnvelope;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

pub use conversation::ConversationStore;
pub use dispatcher::{DispatcherSettings, StepDispatcher, TickReport};
pub use escalation::{EscalationDecision, EscalationPolicy, EscalationQueue, MemoryEscalationStore};
pub use pipeline::{InboundPipeline, PipelineOutcome};
pub use resolver::LeadResolver;
pub use rules::{ConversationRuleEngine, TriggerContext};
pub use scoring::ScoringUpdater;

/// External systems the engine talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub analysis: AnalysisClient,
    pub notifier: Arc<dyn Notifier>,
    pub senders: Vec<Arc<dyn OutboundSender>>,
}

/// The assembled engine.
pub struct Engine {
    pub bus: EventBus,
    pub pipeline: Arc<InboundPipeline>,
    pub dispatcher: Arc<StepDispatcher>,
    pub processor: Arc<AutomationProcessor>,
    pub escalations: Arc<EscalationQueue>,
    pub rules: Arc<ConversationRuleEngine>,
    pub conversations: ConversationStore,
}

impl Engine {
    /// `storage` must already be initialized.
    pub fn build(
        config: &LeadwiseConfig,
        storage: Arc<SqliteStorage>,
        collaborators: Collaborators,
    ) -> Self {
        let bus = EventBus::default();
        let conversations = ConversationStore::new(storage.clone());

        let escalation_store: Arc<dyn EscalationStore> = match config.escalation.store {
            EscalationStoreKind::Sqlite => storage.clone(),
            EscalationStoreKind::Memory => Arc::new(MemoryEscalationStore::new()),
        };
        let escalations = Arc::new(EscalationQueue::new(
            escalation_store,
            storage.clone(),
            Arc::clone(&collaborators.notifier),
            bus.clone(),
        ));
        let decision = EscalationDecision::new(
            EscalationPolicy::from_config(&config.escalation),
            Arc::clone(&escalations),
        );

        let rules = Arc::new(ConversationRuleEngine::new(storage.clone(), storage.clone()));

        let pipeline = Arc::new(InboundPipeline::new(
            LeadResolver::new(storage.clone(), bus.clone(), config.scoring.initial_score),
            conversations.clone(),
            collaborators.analysis.clone(),
            ScoringUpdater::new(storage.clone()),
            storage.clone(),
            decision,
            Arc::clone(&rules),
            bus.clone(),
        ));

        let dispatcher = Arc::new(StepDispatcher::new(
            storage.clone(),
            storage.clone(),
            Arc::clone(&collaborators.transport),
            conversations.clone(),
            rules.wake_handle(),
            DispatcherSettings::from_config(&config.scheduler),
        ));

        let registry = ActionRegistry::with_builtins(ActionDeps {
            transport: collaborators.transport,
            leads: storage.clone(),
            messages: storage.clone(),
            tasks: storage.clone(),
            notifier: collaborators.notifier,
            senders: collaborators.senders,
            analysis: collaborators.analysis,
            bus: bus.clone(),
        });
        let processor = Arc::new(AutomationProcessor::new(
            storage.clone(),
            storage,
            Arc::new(registry),
            config.processor.dedupe_window,
        ));

        Self {
            bus,
            pipeline,
            dispatcher,
            processor,
            escalations,
            rules,
            conversations,
        }
    }

    /// Starts the pipeline, dispatcher, and processor loops on `tracker`.
    ///
    /// The processor subscribes before this returns, so events published
    /// afterwards are never missed.
    pub fn spawn(
        &self,
        inbound: mpsc::Receiver<InboundEnvelope>,
        cancel: &CancellationToken,
        tracker: &TaskTracker,
    ) {
        let events = self.bus.subscribe();
        tracker.spawn(Arc::clone(&self.processor).run(events, cancel.clone()));
        tracker.spawn(Arc::clone(&self.dispatcher).run(cancel.clone()));
        tracker.spawn(Arc::clone(&self.pipeline).run(inbound, cancel.clone()));
        info!(
            actions = self.processor.registry().len(),
            "engine tasks started"
        );
    }
}
