// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator and repository traits.
//!
//! Collaborators (transport, classifier, notifier, named senders) extend the
//! [`PluginAdapter`] base trait. Repositories are plain `#[async_trait]`
//! traits so the engine can be handed any backing store.

pub mod adapter;
pub mod classifier;
pub mod notifier;
pub mod storage;
pub mod transport;

pub use adapter::PluginAdapter;
pub use classifier::Classifier;
pub use notifier::{Notifier, OutboundSender};
pub use storage::{
    AutomationRuleStore, ConversationRuleStore, EscalationStore, LeadStore, MessageStore,
    StepQueue, StorageAdapter, TaskStore,
};
pub use transport::Transport;
