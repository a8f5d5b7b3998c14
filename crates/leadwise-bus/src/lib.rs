// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process event bus for lifecycle events.
//!
//! A thin wrapper over `tokio::sync::broadcast`: every subscriber sees every
//! event published after it subscribed. Slow subscribers may lag and drop
//! events, so handlers treat delivery as best effort and must tolerate
//! redelivery of the same event id.

pub mod events;

use tokio::sync::broadcast;
use tracing::debug;

pub use events::{BusEvent, EventPayload};

/// Default channel capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Cloneable publish/subscribe handle.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event, returning how many subscribers received it.
    pub fn publish(&self, event: BusEvent) -> usize {
        let name = event.name().to_string();
        match self.tx.send(event) {
            Ok(receivers) => {
                debug!(event_type = %name, receivers, "event published");
                receivers
            }
            Err(_) => {
                debug!(event_type = %name, "event published with no subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
