// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI collaborator for the Leadwise automation engine.
//!
//! [`HttpClassifier`] talks to the external classification service;
//! [`AnalysisClient`] wraps any [`Classifier`](leadwise_core::Classifier)
//! with a timeout and the deterministic fallback result.

pub mod analysis;
pub mod client;

use std::sync::Arc;
use std::time::Duration;

use leadwise_config::model::ClassifierConfig;
use leadwise_core::LeadwiseError;
use tracing::info;

pub use analysis::AnalysisClient;
pub use client::HttpClassifier;

/// Builds the analysis client from configuration.
///
/// Without an endpoint every analysis falls back.
pub fn analysis_client_from_config(config: &ClassifierConfig) -> Result<AnalysisClient, LeadwiseError> {
    let timeout = Duration::from_millis(config.timeout_ms);
    match &config.endpoint {
        Some(endpoint) => {
            let classifier = HttpClassifier::new(endpoint, config.api_key.as_deref(), timeout)?;
            info!(endpoint = %endpoint, "classifier configured");
            Ok(AnalysisClient::new(Arc::new(classifier), timeout))
        }
        None => {
            info!("no classifier endpoint configured, analyses will use the fallback");
            Ok(AnalysisClient::disabled())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadwise_core::PluginAdapter;

    #[test]
    fn missing_endpoint_builds_disabled_client() {
        let client = analysis_client_from_config(&ClassifierConfig::default()).unwrap();
        assert!(client.classifier().is_none());
    }

    #[test]
    fn endpoint_builds_http_classifier() {
        let config = ClassifierConfig {
            endpoint: Some("http://127.0.0.1:9/".into()),
            api_key: None,
            timeout_ms: 100,
        };
        let client = analysis_client_from_config(&config).unwrap();
        assert_eq!(client.classifier().unwrap().name(), "http-classifier");
    }
}
