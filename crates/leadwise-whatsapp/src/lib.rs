// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp channel for Leadwise.
//!
//! Normalizes raw session-gateway messages, sends outbound text through the
//! gateway, and exposes the signed inbound webhook.

pub mod normalizer;
pub mod transport;
pub mod webhook;

pub use normalizer::normalize;
pub use transport::GatewayTransport;
pub use webhook::{InboundEnvelope, ServerConfig, WebhookState};
