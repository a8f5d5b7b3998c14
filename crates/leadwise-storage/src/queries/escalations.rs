// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pending escalations, keyed by lead.

use leadwise_core::LeadwiseError;
use leadwise_core::types::{Escalation, format_timestamp};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::queries::{enum_col, json_col, to_json, ts_col};

const ESCALATION_COLUMNS: &str =
    "tenant_id, lead_id, reason, detail, created_at, message, analysis";

fn map_escalation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Escalation> {
    Ok(Escalation {
        tenant_id: row.get(0)?,
        lead_id: row.get(1)?,
        reason: enum_col(row, 2)?,
        detail: row.get(3)?,
        created_at: ts_col(row, 4)?,
        message: json_col(row, 5)?,
        analysis: json_col(row, 6)?,
    })
}

/// Insert or replace the escalation for its lead.
pub async fn put(db: &Database, escalation: &Escalation) -> Result<(), LeadwiseError> {
    let message = to_json(&escalation.message)?;
    let analysis = to_json(&escalation.analysis)?;
    let esc = escalation.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO escalations (tenant_id, lead_id, reason, detail, created_at, message, analysis)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (lead_id) DO UPDATE SET
                     tenant_id = excluded.tenant_id,
                     reason = excluded.reason,
                     detail = excluded.detail,
                     created_at = excluded.created_at,
                     message = excluded.message,
                     analysis = excluded.analysis",
                params![
                    esc.tenant_id,
                    esc.lead_id,
                    esc.reason.to_string(),
                    esc.detail,
                    format_timestamp(&esc.created_at),
                    message,
                    analysis,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// The pending escalation of a lead, if any.
pub async fn get(db: &Database, lead_id: &str) -> Result<Option<Escalation>, LeadwiseError> {
    let lead_id = lead_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {ESCALATION_COLUMNS} FROM escalations WHERE lead_id = ?1"),
                params![lead_id],
                map_escalation,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Pending escalations of a tenant, oldest first.
pub async fn list(db: &Database, tenant_id: &str) -> Result<Vec<Escalation>, LeadwiseError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ESCALATION_COLUMNS} FROM escalations
                 WHERE tenant_id = ?1 ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map(params![tenant_id], map_escalation)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete the escalation of a lead, returning it.
pub async fn remove(db: &Database, lead_id: &str) -> Result<Option<Escalation>, LeadwiseError> {
    let lead_id = lead_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("DELETE FROM escalations WHERE lead_id = ?1 RETURNING {ESCALATION_COLUMNS}"),
                params![lead_id],
                map_escalation,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{at, setup_db};
    use leadwise_core::types::{AnalysisResult, ContentType, EscalationReason, NormalizedMessage};

    fn escalation(lead_id: &str, reason: EscalationReason, ts: &str) -> Escalation {
        Escalation {
            tenant_id: "tenant-a".into(),
            lead_id: lead_id.into(),
            reason,
            detail: "matched keyword: urgent".into(),
            created_at: at(ts),
            message: NormalizedMessage {
                external_id: "ABC".into(),
                sender: "15551234567".into(),
                recipient: "tenant-a".into(),
                content: "this is urgent".into(),
                content_type: ContentType::Text,
                timestamp: at(ts),
                media_url: None,
                push_name: Some("Maria".into()),
                is_group: false,
                is_status_broadcast: false,
                from_me: false,
            },
            analysis: AnalysisResult::fallback(),
        }
    }

    #[tokio::test]
    async fn put_replaces_existing_entry_for_lead() {
        let (db, _dir) = setup_db().await;
        put(&db, &escalation("lead-1", EscalationReason::UrgentKeyword, "2026-03-01T10:00:00Z"))
            .await
            .unwrap();
        put(&db, &escalation("lead-1", EscalationReason::NegativeSentiment, "2026-03-01T11:00:00Z"))
            .await
            .unwrap();

        let all = list(&db, "tenant-a").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].reason, EscalationReason::NegativeSentiment);
        assert_eq!(all[0].message.push_name.as_deref(), Some("Maria"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_is_oldest_first_and_remove_returns_entry() {
        let (db, _dir) = setup_db().await;
        put(&db, &escalation("lead-2", EscalationReason::UrgentKeyword, "2026-03-01T12:00:00Z"))
            .await
            .unwrap();
        put(&db, &escalation("lead-1", EscalationReason::UrgentKeyword, "2026-03-01T09:00:00Z"))
            .await
            .unwrap();

        let all = list(&db, "tenant-a").await.unwrap();
        let leads: Vec<_> = all.iter().map(|e| e.lead_id.as_str()).collect();
        assert_eq!(leads, vec!["lead-1", "lead-2"]);

        let removed = remove(&db, "lead-1").await.unwrap().unwrap();
        assert_eq!(removed.lead_id, "lead-1");
        assert!(get(&db, "lead-1").await.unwrap().is_none());
        assert!(remove(&db, "lead-1").await.unwrap().is_none());
        db.close().await.unwrap();
    }
}
