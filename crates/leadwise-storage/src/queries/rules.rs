// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation rules and generic automation rules.
//!
//! Triggers, steps, and action lists are stored as JSON text columns.

use leadwise_core::LeadwiseError;
use leadwise_core::types::{AutomationRule, ConversationRule};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::{json_col, to_json};

/// Insert or update a conversation rule, keeping its original position.
pub async fn save_conversation_rule(
    db: &Database,
    rule: &ConversationRule,
) -> Result<(), LeadwiseError> {
    rule.validate()?;
    let trigger = to_json(&rule.trigger)?;
    let steps = to_json(&rule.steps)?;
    let rule = rule.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversation_rules (id, tenant_id, name, trigger_spec, steps, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (id) DO UPDATE SET
                     name = excluded.name,
                     trigger_spec = excluded.trigger_spec,
                     steps = excluded.steps,
                     is_active = excluded.is_active",
                params![rule.id, rule.tenant_id, rule.name, trigger, steps, rule.is_active],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Active conversation rules of a tenant in creation order.
pub async fn active_conversation_rules(
    db: &Database,
    tenant_id: &str,
) -> Result<Vec<ConversationRule>, LeadwiseError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, name, trigger_spec, steps, is_active
                 FROM conversation_rules
                 WHERE tenant_id = ?1 AND is_active = 1
                 ORDER BY rowid ASC",
            )?;
            let rows = stmt.query_map(params![tenant_id], |row| {
                Ok(ConversationRule {
                    id: row.get(0)?,
                    tenant_id: row.get(1)?,
                    name: row.get(2)?,
                    trigger: json_col(row, 3)?,
                    steps: json_col(row, 4)?,
                    is_active: row.get(5)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Number of conversation rules a tenant has, active or not.
pub async fn count_conversation_rules(db: &Database, tenant_id: &str) -> Result<i64, LeadwiseError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM conversation_rules WHERE tenant_id = ?1",
                params![tenant_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Insert or update a generic automation rule.
pub async fn save_automation_rule(db: &Database, rule: &AutomationRule) -> Result<(), LeadwiseError> {
    let actions = to_json(&rule.actions)?;
    let rule = rule.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO automation_rules (id, tenant_id, name, trigger_event, actions, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (id) DO UPDATE SET
                     name = excluded.name,
                     trigger_event = excluded.trigger_event,
                     actions = excluded.actions,
                     is_active = excluded.is_active",
                params![
                    rule.id,
                    rule.tenant_id,
                    rule.name,
                    rule.trigger_event,
                    actions,
                    rule.is_active
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Active automation rules of a tenant bound to `event_name`.
pub async fn active_rules_for_event(
    db: &Database,
    tenant_id: &str,
    event_name: &str,
) -> Result<Vec<AutomationRule>, LeadwiseError> {
    let tenant_id = tenant_id.to_string();
    let event_name = event_name.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, name, trigger_event, actions, is_active
                 FROM automation_rules
                 WHERE tenant_id = ?1 AND trigger_event = ?2 AND is_active = 1
                 ORDER BY rowid ASC",
            )?;
            let rows = stmt.query_map(params![tenant_id, event_name], |row| {
                Ok(AutomationRule {
                    id: row.get(0)?,
                    tenant_id: row.get(1)?,
                    name: row.get(2)?,
                    trigger_event: row.get(3)?,
                    actions: json_col(row, 4)?,
                    is_active: row.get(5)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;
    use leadwise_core::types::{ConversationTrigger, RuleAction, RuleStep};

    fn conversation_rule(id: &str, trigger: ConversationTrigger, active: bool) -> ConversationRule {
        ConversationRule {
            id: id.into(),
            tenant_id: "tenant-a".into(),
            name: format!("rule {id}"),
            trigger,
            steps: vec![
                RuleStep {
                    delay_ms: 0,
                    template: "Hi {{name}}".into(),
                },
                RuleStep {
                    delay_ms: 1000,
                    template: "Still there?".into(),
                },
            ],
            is_active: active,
        }
    }

    #[tokio::test]
    async fn conversation_rules_round_trip_and_filter_inactive() {
        let (db, _dir) = setup_db().await;
        save_conversation_rule(&db, &conversation_rule("r1", ConversationTrigger::FirstMessage, true))
            .await
            .unwrap();
        let keyword = ConversationTrigger::KeywordMatch {
            keywords: vec!["price".into()],
        };
        save_conversation_rule(&db, &conversation_rule("r2", keyword.clone(), true))
            .await
            .unwrap();
        save_conversation_rule(
            &db,
            &conversation_rule("r3", ConversationTrigger::UrgentMessage, false),
        )
        .await
        .unwrap();

        let active = active_conversation_rules(&db, "tenant-a").await.unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].id, "r1");
        assert_eq!(active[1].trigger, keyword);
        assert_eq!(active[0].steps[1].delay_ms, 1000);
        assert_eq!(count_conversation_rules(&db, "tenant-a").await.unwrap(), 3);
        assert_eq!(count_conversation_rules(&db, "tenant-b").await.unwrap(), 0);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn saving_existing_rule_updates_in_place() {
        let (db, _dir) = setup_db().await;
        save_conversation_rule(&db, &conversation_rule("r1", ConversationTrigger::FirstMessage, true))
            .await
            .unwrap();
        save_conversation_rule(&db, &conversation_rule("r2", ConversationTrigger::FirstMessage, true))
            .await
            .unwrap();
        save_conversation_rule(&db, &conversation_rule("r1", ConversationTrigger::FirstMessage, false))
            .await
            .unwrap();
        let active = active_conversation_rules(&db, "tenant-a").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "r2");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn automation_rules_are_selected_by_event() {
        let (db, _dir) = setup_db().await;
        let rule = AutomationRule {
            id: "a1".into(),
            tenant_id: "tenant-a".into(),
            name: "welcome".into(),
            trigger_event: "LEAD_CREATED".into(),
            actions: vec![RuleAction {
                action_type: "SEND_WHATSAPP".into(),
                config: serde_json::json!({"template": "Welcome {{lead.name}}"}),
                conditions: vec![],
            }],
            is_active: true,
        };
        save_automation_rule(&db, &rule).await.unwrap();

        let found = active_rules_for_event(&db, "tenant-a", "LEAD_CREATED")
            .await
            .unwrap();
        assert_eq!(found, vec![rule]);
        assert!(
            active_rules_for_event(&db, "tenant-a", "LEAD_STATUS_CHANGED")
                .await
                .unwrap()
                .is_empty()
        );
        db.close().await.unwrap();
    }
}
