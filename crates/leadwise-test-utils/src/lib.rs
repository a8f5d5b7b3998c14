// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Leadwise integration tests.
//!
//! Provides mock collaborators and test harness infrastructure for fast,
//! deterministic tests without a WhatsApp gateway or AI service.
//!
//! # Components
//!
//! - [`MockTransport`] - Captures outbound WhatsApp sends
//! - [`MockClassifier`] - Preset analyses and generated copy
//! - [`MockNotifier`] / [`MockSender`] - Capture coach alerts and channel messages
//! - [`TestHarness`] - Full engine over a temp database

pub mod fixtures;
pub mod harness;
pub mod mock_classifier;
pub mod mock_notifier;
pub mod mock_transport;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_classifier::MockClassifier;
pub use mock_notifier::{ChannelMessage, MockNotifier, MockSender, Notification};
pub use mock_transport::{MockTransport, SentMessage};
