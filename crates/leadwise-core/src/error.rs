// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Leadwise automation engine.

use thiserror::Error;

/// The primary error type returned by every pipeline step, repository, and
/// collaborator adapter.
#[derive(Debug, Error)]
pub enum LeadwiseError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Outbound transport errors (session gateway unreachable, send rejected).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// AI classifier or generation errors.
    #[error("classifier error: {message}")]
    Classifier {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Notification or named outbound sender errors (email, SMS, webhook).
    #[error("delivery error: {message}")]
    Delivery {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Input data is missing or malformed (bad rule config, unknown status).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LeadwiseError {
    /// Wraps any error as a storage error.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        LeadwiseError::Storage {
            source: Box::new(source),
        }
    }

    /// Builds a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        LeadwiseError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a classifier error without an underlying source.
    pub fn classifier(message: impl Into<String>) -> Self {
        LeadwiseError::Classifier {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a delivery error without an underlying source.
    pub fn delivery(message: impl Into<String>) -> Self {
        LeadwiseError::Delivery {
            message: message.into(),
            source: None,
        }
    }
}
