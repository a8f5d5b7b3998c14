// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage traits.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use leadwise_config::model::StorageConfig;
use leadwise_core::types::{
    AutomationRule, ConversationRule, Escalation, Lead, LeadStatus, LeadUpsert, MessageRecord,
    NewContact, NewScheduledStep, ScheduledStep, ScoreDelta, StepStatus, Task,
};
use leadwise_core::{
    AdapterType, AutomationRuleStore, ConversationRuleStore, EscalationStore, HealthStatus,
    LeadStore, LeadwiseError, MessageStore, PluginAdapter, StepQueue, StorageAdapter, TaskStore,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    step_max_attempts: i64,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            step_max_attempts: 3,
            db: OnceCell::new(),
        }
    }

    /// Attempts given to each newly scheduled step.
    pub fn with_step_max_attempts(mut self, max_attempts: i64) -> Self {
        self.step_max_attempts = max_attempts.max(1);
        self
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    pub fn db(&self) -> Result<&Database, LeadwiseError> {
        self.db.get().ok_or_else(|| LeadwiseError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// Number of a lead's scheduled steps in `status`.
    pub async fn count_steps(&self, lead_id: &str, status: StepStatus) -> Result<i64, LeadwiseError> {
        queries::steps::count_for_lead(self.db()?, lead_id, status).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, LeadwiseError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LeadwiseError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
            debug!("shutdown: database closed");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), LeadwiseError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| LeadwiseError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), LeadwiseError> {
        self.db()?.close().await
    }
}

#[async_trait]
impl LeadStore for SqliteStorage {
    async fn upsert_contact(&self, contact: &NewContact) -> Result<LeadUpsert, LeadwiseError> {
        queries::leads::upsert_contact(self.db()?, contact).await
    }

    async fn get_lead(&self, lead_id: &str) -> Result<Option<Lead>, LeadwiseError> {
        queries::leads::get_lead(self.db()?, lead_id).await
    }

    async fn find_by_phone(
        &self,
        tenant_id: &str,
        phone_number: &str,
    ) -> Result<Option<Lead>, LeadwiseError> {
        queries::leads::find_by_phone(self.db()?, tenant_id, phone_number).await
    }

    async fn set_status(&self, lead_id: &str, status: LeadStatus) -> Result<(), LeadwiseError> {
        queries::leads::set_status(self.db()?, lead_id, status).await
    }

    async fn assign_coach(&self, lead_id: &str, coach_id: &str) -> Result<(), LeadwiseError> {
        queries::leads::assign_coach(self.db()?, lead_id, coach_id).await
    }

    async fn apply_score(&self, lead_id: &str, delta: &ScoreDelta) -> Result<i64, LeadwiseError> {
        queries::leads::apply_score(self.db()?, lead_id, delta).await
    }

    async fn increment_negative_count(&self, lead_id: &str) -> Result<i64, LeadwiseError> {
        queries::leads::increment_negative_count(self.db()?, lead_id).await
    }

    async fn reset_negative_count(&self, lead_id: &str) -> Result<(), LeadwiseError> {
        queries::leads::reset_negative_count(self.db()?, lead_id).await
    }
}

#[async_trait]
impl MessageStore for SqliteStorage {
    async fn insert_message(&self, message: &MessageRecord) -> Result<(), LeadwiseError> {
        queries::messages::insert_message(self.db()?, message).await
    }

    async fn has_inbound_message(
        &self,
        tenant_id: &str,
        external_id: &str,
    ) -> Result<bool, LeadwiseError> {
        queries::messages::has_inbound_message(self.db()?, tenant_id, external_id).await
    }

    async fn recent_messages(
        &self,
        tenant_id: &str,
        lead_id: &str,
        limit: i64,
    ) -> Result<Vec<MessageRecord>, LeadwiseError> {
        queries::messages::recent_messages(self.db()?, tenant_id, lead_id, limit).await
    }
}

#[async_trait]
impl EscalationStore for SqliteStorage {
    async fn put(&self, escalation: &Escalation) -> Result<(), LeadwiseError> {
        queries::escalations::put(self.db()?, escalation).await
    }

    async fn get(&self, lead_id: &str) -> Result<Option<Escalation>, LeadwiseError> {
        queries::escalations::get(self.db()?, lead_id).await
    }

    async fn list(&self, tenant_id: &str) -> Result<Vec<Escalation>, LeadwiseError> {
        queries::escalations::list(self.db()?, tenant_id).await
    }

    async fn remove(&self, lead_id: &str) -> Result<Option<Escalation>, LeadwiseError> {
        queries::escalations::remove(self.db()?, lead_id).await
    }
}

#[async_trait]
impl ConversationRuleStore for SqliteStorage {
    async fn save_conversation_rule(&self, rule: &ConversationRule) -> Result<(), LeadwiseError> {
        queries::rules::save_conversation_rule(self.db()?, rule).await
    }

    async fn active_conversation_rules(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<ConversationRule>, LeadwiseError> {
        queries::rules::active_conversation_rules(self.db()?, tenant_id).await
    }

    async fn count_conversation_rules(&self, tenant_id: &str) -> Result<i64, LeadwiseError> {
        queries::rules::count_conversation_rules(self.db()?, tenant_id).await
    }
}

#[async_trait]
impl AutomationRuleStore for SqliteStorage {
    async fn save_automation_rule(&self, rule: &AutomationRule) -> Result<(), LeadwiseError> {
        queries::rules::save_automation_rule(self.db()?, rule).await
    }

    async fn active_rules_for_event(
        &self,
        tenant_id: &str,
        event_name: &str,
    ) -> Result<Vec<AutomationRule>, LeadwiseError> {
        queries::rules::active_rules_for_event(self.db()?, tenant_id, event_name).await
    }
}

#[async_trait]
impl StepQueue for SqliteStorage {
    async fn schedule(&self, steps: &[NewScheduledStep]) -> Result<Vec<i64>, LeadwiseError> {
        queries::steps::schedule(self.db()?, steps, self.step_max_attempts).await
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
        lock_for: Duration,
    ) -> Result<Vec<ScheduledStep>, LeadwiseError> {
        queries::steps::claim_due(self.db()?, now, limit, lock_for).await
    }

    async fn complete(&self, step_id: i64) -> Result<(), LeadwiseError> {
        queries::steps::complete(self.db()?, step_id).await
    }

    async fn fail(
        &self,
        step_id: i64,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<StepStatus, LeadwiseError> {
        queries::steps::fail(self.db()?, step_id, error, retry_at).await
    }

    async fn release_expired(&self, now: DateTime<Utc>) -> Result<i64, LeadwiseError> {
        queries::steps::release_expired(self.db()?, now).await
    }
}

#[async_trait]
impl TaskStore for SqliteStorage {
    async fn create_task(&self, task: &Task) -> Result<(), LeadwiseError> {
        queries::tasks::create_task(self.db()?, task).await
    }

    async fn list_tasks(&self, tenant_id: &str) -> Result<Vec<Task>, LeadwiseError> {
        queries::tasks::list_tasks(self.db()?, tenant_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_in(dir: &tempfile::TempDir) -> StorageConfig {
        StorageConfig {
            database_path: dir.path().join("adapter.db").display().to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn operations_before_initialize_fail() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(config_in(&dir));
        assert!(storage.get_lead("x").await.is_err());
        assert!(storage.health_check().await.is_err());
    }

    #[tokio::test]
    async fn initialize_twice_fails() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(config_in(&dir));
        storage.initialize().await.unwrap();
        assert!(storage.initialize().await.is_err());
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
        storage.close().await.unwrap();
    }

    #[tokio::test]
    async fn scheduled_steps_carry_configured_attempts() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(config_in(&dir)).with_step_max_attempts(7);
        storage.initialize().await.unwrap();
        let due = Utc::now();
        storage
            .schedule(&[NewScheduledStep {
                tenant_id: "tenant-a".into(),
                lead_id: "lead-1".into(),
                rule_id: "rule-1".into(),
                step_index: 0,
                template: "Hello".into(),
                due_at: due,
            }])
            .await
            .unwrap();
        let claimed = storage
            .claim_due(due, 10, Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(claimed[0].max_attempts, 7);
        assert_eq!(
            storage.count_steps("lead-1", StepStatus::Processing).await.unwrap(),
            1
        );
        storage.close().await.unwrap();
    }
}
