// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.

use crate::diagnostic::ConfigError;
use crate::model::LeadwiseConfig;

/// Validates a deserialized configuration.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &LeadwiseConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let addr = config.whatsapp.bind_address.trim();
    if addr.is_empty() {
        fail("whatsapp.bind_address must not be empty".to_string());
    } else if addr.parse::<std::net::IpAddr>().is_err()
        && !addr
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        fail(format!(
            "whatsapp.bind_address `{addr}` is not a valid IP address or hostname"
        ));
    }

    if config.whatsapp.gateway_url.trim().is_empty() {
        fail("whatsapp.gateway_url must not be empty".to_string());
    }

    let threshold = config.escalation.negative_sentiment_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        fail(format!(
            "escalation.negative_sentiment_threshold must be within 0.0..=1.0, got {threshold}"
        ));
    }

    if config.escalation.negative_message_threshold < 1 {
        fail(format!(
            "escalation.negative_message_threshold must be at least 1, got {}",
            config.escalation.negative_message_threshold
        ));
    }

    for (i, keyword) in config.escalation.urgent_keywords.iter().enumerate() {
        if keyword.trim().is_empty() {
            fail(format!("escalation.urgent_keywords[{i}] must not be empty"));
        }
    }

    if config.scheduler.poll_interval_ms == 0 {
        fail("scheduler.poll_interval_ms must be greater than 0".to_string());
    }

    if config.scheduler.batch_size < 1 {
        fail(format!(
            "scheduler.batch_size must be at least 1, got {}",
            config.scheduler.batch_size
        ));
    }

    if config.scheduler.max_attempts < 1 {
        fail(format!(
            "scheduler.max_attempts must be at least 1, got {}",
            config.scheduler.max_attempts
        ));
    }

    if config.classifier.timeout_ms == 0 {
        fail("classifier.timeout_ms must be greater than 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&LeadwiseConfig::default()).is_ok());
    }

    #[test]
    fn threshold_out_of_range_fails() {
        let mut config = LeadwiseConfig::default();
        config.escalation.negative_sentiment_threshold = 1.5;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "negative_sentiment_threshold"));
    }

    #[test]
    fn blank_keyword_fails() {
        let mut config = LeadwiseConfig::default();
        config.escalation.urgent_keywords.push("  ".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "urgent_keywords[5]"));
    }

    #[test]
    fn collects_every_failure() {
        let mut config = LeadwiseConfig::default();
        config.storage.database_path = String::new();
        config.scheduler.batch_size = 0;
        config.scheduler.poll_interval_ms = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn invalid_bind_address_fails() {
        let mut config = LeadwiseConfig::default();
        config.whatsapp.bind_address = "not a host!".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "bind_address"));
    }

    #[test]
    fn ipv6_bind_address_passes() {
        let mut config = LeadwiseConfig::default();
        config.whatsapp.bind_address = "::1".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
