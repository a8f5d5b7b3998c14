// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead upsert, lookup, and atomic counter updates.

use chrono::Utc;
use leadwise_core::LeadwiseError;
use leadwise_core::types::{
    Lead, LeadStatus, LeadUpsert, NewContact, ScoreDelta, format_timestamp,
};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::queries::{enum_col, to_json, ts_col};

const LEAD_COLUMNS: &str = "id, tenant_id, phone_number, name, status, score, source,
     assigned_coach_id, first_message, first_contact_at, last_contact_at, message_count,
     negative_message_count, is_active, created_at, updated_at";

fn map_lead(row: &rusqlite::Row<'_>) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        phone_number: row.get(2)?,
        name: row.get(3)?,
        status: enum_col(row, 4)?,
        score: row.get(5)?,
        source: row.get(6)?,
        assigned_coach_id: row.get(7)?,
        first_message: row.get(8)?,
        first_contact_at: ts_col(row, 9)?,
        last_contact_at: ts_col(row, 10)?,
        message_count: row.get(11)?,
        negative_message_count: row.get(12)?,
        is_active: row.get(13)?,
        created_at: ts_col(row, 14)?,
        updated_at: ts_col(row, 15)?,
    })
}

/// Creates the lead or touches the existing one in a single statement.
///
/// `ON CONFLICT ... DO UPDATE ... RETURNING` makes concurrent first messages
/// for the same (tenant, phone) collapse onto one row. The lead counts as
/// created when the returned id is the one this call generated.
pub async fn upsert_contact(
    db: &Database,
    contact: &NewContact,
) -> Result<LeadUpsert, LeadwiseError> {
    let contact = contact.clone();
    let new_id = uuid::Uuid::new_v4().to_string();
    let sql = format!(
        "INSERT INTO leads (id, tenant_id, phone_number, name, status, score, source,
             first_message, first_contact_at, last_contact_at, message_count,
             negative_message_count, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, 1, 0, 1, ?9, ?9)
         ON CONFLICT (tenant_id, phone_number) DO UPDATE SET
             last_contact_at = excluded.last_contact_at,
             message_count = leads.message_count + 1,
             is_active = 1,
             name = CASE
                 WHEN leads.name = leads.phone_number THEN excluded.name
                 ELSE leads.name
             END,
             updated_at = excluded.updated_at
         RETURNING {LEAD_COLUMNS}"
    );
    let id = new_id.clone();
    let lead = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                &sql,
                params![
                    id,
                    contact.tenant_id,
                    contact.phone_number,
                    contact.name,
                    LeadStatus::New.to_string(),
                    contact.initial_score,
                    contact.source,
                    contact.first_message,
                    format_timestamp(&contact.contacted_at),
                ],
                map_lead,
            )
        })
        .await
        .map_err(map_tr_err)?;
    let created = lead.id == new_id;
    Ok(LeadUpsert { lead, created })
}

/// Get a lead by id.
pub async fn get_lead(db: &Database, lead_id: &str) -> Result<Option<Lead>, LeadwiseError> {
    let lead_id = lead_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"),
                params![lead_id],
                map_lead,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Get a lead by its tenant-scoped phone number.
pub async fn find_by_phone(
    db: &Database,
    tenant_id: &str,
    phone_number: &str,
) -> Result<Option<Lead>, LeadwiseError> {
    let tenant_id = tenant_id.to_string();
    let phone_number = phone_number.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {LEAD_COLUMNS} FROM leads WHERE tenant_id = ?1 AND phone_number = ?2"
                ),
                params![tenant_id, phone_number],
                map_lead,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Runs a single-row UPDATE binding (id, now, value), reporting a missing
/// lead as `NotFound`.
async fn update_one(
    db: &Database,
    lead_id: &str,
    sql: &'static str,
    value: String,
) -> Result<(), LeadwiseError> {
    let id = lead_id.to_string();
    let now = format_timestamp(&Utc::now());
    let changed = db
        .connection()
        .call(move |conn| conn.execute(sql, params![id, now, value]))
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(LeadwiseError::NotFound {
            entity: "lead",
            id: lead_id.to_string(),
        });
    }
    Ok(())
}

/// Set a lead's lifecycle status.
pub async fn set_status(
    db: &Database,
    lead_id: &str,
    status: LeadStatus,
) -> Result<(), LeadwiseError> {
    update_one(
        db,
        lead_id,
        "UPDATE leads SET status = ?3, updated_at = ?2 WHERE id = ?1",
        status.to_string(),
    )
    .await
}

/// Assign a lead to a coach.
pub async fn assign_coach(db: &Database, lead_id: &str, coach_id: &str) -> Result<(), LeadwiseError> {
    update_one(
        db,
        lead_id,
        "UPDATE leads SET assigned_coach_id = ?3, updated_at = ?2 WHERE id = ?1",
        coach_id.to_string(),
    )
    .await
}

/// Clear the negative-message counter after an escalation is resolved.
pub async fn reset_negative_count(db: &Database, lead_id: &str) -> Result<(), LeadwiseError> {
    let id = lead_id.to_string();
    let now = format_timestamp(&Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE leads SET negative_message_count = 0, updated_at = ?2 WHERE id = ?1",
                params![id, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Atomically increment the negative-message counter, returning the new value.
pub async fn increment_negative_count(db: &Database, lead_id: &str) -> Result<i64, LeadwiseError> {
    let id = lead_id.to_string();
    let now = format_timestamp(&Utc::now());
    let count = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "UPDATE leads SET negative_message_count = negative_message_count + 1,
                     updated_at = ?2
                 WHERE id = ?1
                 RETURNING negative_message_count",
                params![id, now],
                |row| row.get::<_, i64>(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;
    count.ok_or_else(|| LeadwiseError::NotFound {
        entity: "lead",
        id: lead_id.to_string(),
    })
}

/// Add a score delta and record its reasons in one transaction.
///
/// Returns the new cumulative score.
pub async fn apply_score(
    db: &Database,
    lead_id: &str,
    delta: &ScoreDelta,
) -> Result<i64, LeadwiseError> {
    let id = lead_id.to_string();
    let points = delta.delta;
    let reasons = to_json(&delta.reasons)?;
    let now = format_timestamp(&Utc::now());
    let score = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let score = tx
                .query_row(
                    "UPDATE leads SET score = score + ?2, updated_at = ?3
                     WHERE id = ?1
                     RETURNING score",
                    params![id, points, now],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?;
            if let Some(score_after) = score {
                tx.execute(
                    "INSERT INTO score_events (lead_id, delta, score_after, reasons, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![id, points, score_after, reasons, now],
                )?;
            }
            tx.commit()?;
            Ok(score)
        })
        .await
        .map_err(map_tr_err)?;
    score.ok_or_else(|| LeadwiseError::NotFound {
        entity: "lead",
        id: lead_id.to_string(),
    })
}
