// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builders for common test values.

use std::sync::Arc;

use chrono::Utc;
use leadwise_config::model::StorageConfig;
use leadwise_core::types::{AnalysisResult, ContentType, NormalizedMessage, Sentiment, Urgency};
use leadwise_core::{LeadwiseError, StorageAdapter};
use leadwise_storage::SqliteStorage;
use tempfile::TempDir;

pub fn analysis(sentiment: Sentiment, score: f64, intent: &str, urgency: Urgency) -> AnalysisResult {
    AnalysisResult {
        sentiment,
        sentiment_score: score,
        intent: intent.to_string(),
        urgency,
        keywords: Vec::new(),
        confidence: 0.9,
    }
}

/// A plain one-to-one text message from `phone`.
pub fn inbound_message(phone: &str, text: &str) -> NormalizedMessage {
    NormalizedMessage {
        external_id: uuid::Uuid::new_v4().to_string(),
        sender: phone.to_string(),
        recipient: "15550000000".to_string(),
        content: text.to_string(),
        content_type: ContentType::Text,
        timestamp: Utc::now(),
        media_url: None,
        push_name: None,
        is_group: false,
        is_status_broadcast: false,
        from_me: false,
    }
}

/// Initialized SQLite storage in a fresh temp directory. Keep the directory
/// alive for as long as the storage is used.
pub async fn temp_storage() -> Result<(Arc<SqliteStorage>, TempDir), LeadwiseError> {
    temp_storage_with_attempts(3).await
}

pub async fn temp_storage_with_attempts(
    max_attempts: i64,
) -> Result<(Arc<SqliteStorage>, TempDir), LeadwiseError> {
    let dir = TempDir::new().map_err(LeadwiseError::storage)?;
    let storage = SqliteStorage::new(StorageConfig {
        database_path: dir.path().join("test.db").display().to_string(),
        wal_mode: true,
    })
    .with_step_max_attempts(max_attempts);
    storage.initialize().await?;
    Ok((Arc::new(storage), dir))
}
