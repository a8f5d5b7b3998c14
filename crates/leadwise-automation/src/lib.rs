// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Declarative automation for Leadwise.
//!
//! - [`template`] renders `{{path}}` placeholders against JSON context.
//! - [`conditions`] evaluates `eq`/`ne`/`gt`/`lt` action conditions.
//! - [`actions`] holds the action registry and the built-in handlers.
//! - [`processor`] binds bus events to persisted automation rules.

pub mod actions;
pub mod conditions;
pub mod processor;
pub mod template;

pub use actions::{
    ActionContext, ActionDeps, ActionHandler, ActionOutcome, ActionRegistry, register_builtins,
};
pub use processor::{ActionReport, ActionResult, AutomationProcessor, EventReport};
pub use template::{render, render_value};
