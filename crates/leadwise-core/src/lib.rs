// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Leadwise conversation automation engine.
//!
//! Defines the domain types, the crate-wide error type, and the traits at
//! every collaborator seam: outbound transport, AI classifier, notification
//! and named senders, and the repositories holding shared state.

pub mod error;
pub mod traits;
pub mod types;

pub use error::LeadwiseError;
pub use types::{AdapterType, HealthStatus};

pub use traits::{
    AutomationRuleStore, Classifier, ConversationRuleStore, EscalationStore, LeadStore,
    MessageStore, Notifier, OutboundSender, PluginAdapter, StepQueue, StorageAdapter, TaskStore,
    Transport,
};
