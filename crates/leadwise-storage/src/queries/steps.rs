// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable queue of delayed conversation steps.
//!
//! Lifecycle: `pending` -> `processing` (claimed, locked) -> `completed`, or
//! back to `pending` (due at the retry time) on a retryable failure until `max_attempts` is reached,
//! then `failed`. A claim whose lock expires is released back to `pending`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use leadwise_core::LeadwiseError;
use leadwise_core::types::{NewScheduledStep, ScheduledStep, StepStatus, format_timestamp};
use rusqlite::{OptionalExtension, params};
use tracing::warn;

use crate::database::{Database, map_tr_err};
use crate::queries::{enum_col, ts_col};

/// Persist steps, returning their ids in input order.
pub async fn schedule(
    db: &Database,
    steps: &[NewScheduledStep],
    max_attempts: i64,
) -> Result<Vec<i64>, LeadwiseError> {
    let steps = steps.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let mut ids = Vec::with_capacity(steps.len());
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO scheduled_steps
                         (tenant_id, lead_id, rule_id, step_index, template, due_at, max_attempts)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                for step in &steps {
                    stmt.execute(params![
                        step.tenant_id,
                        step.lead_id,
                        step.rule_id,
                        step.step_index,
                        step.template,
                        format_timestamp(&step.due_at),
                        max_attempts,
                    ])?;
                    ids.push(tx.last_insert_rowid());
                }
            }
            tx.commit()?;
            Ok(ids)
        })
        .await
        .map_err(map_tr_err)
}

/// Claim up to `limit` pending steps due at or before `now`.
///
/// Selection and the switch to `processing` happen in one transaction so two
/// dispatchers sharing the database never claim the same step. A row that
/// cannot be decoded is marked `failed` on its own; the rest of the batch is
/// still claimed.
pub async fn claim_due(
    db: &Database,
    now: DateTime<Utc>,
    limit: i64,
    lock_for: Duration,
) -> Result<Vec<ScheduledStep>, LeadwiseError> {
    let now_s = format_timestamp(&now);
    let lock = chrono::Duration::from_std(lock_for).map_err(LeadwiseError::storage)?;
    let locked_until = format_timestamp(&now.checked_add_signed(lock).unwrap_or(now));
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let rows = {
                let mut stmt = tx.prepare(
                    "SELECT id, tenant_id, lead_id, rule_id, step_index, template, due_at,
                            status, attempts, max_attempts, last_error
                     FROM scheduled_steps
                     WHERE status = 'pending' AND due_at <= ?1
                     ORDER BY due_at ASC, id ASC
                     LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![now_s, limit], |row| {
                    Ok((row.get::<_, i64>(0)?, step_from_row(row)))
                })?;
                rows.collect::<Result<Vec<_>, _>>()?
            };

            let mut claimed = Vec::with_capacity(rows.len());
            for (id, decoded) in rows {
                match decoded {
                    Ok(step) => {
                        tx.execute(
                            "UPDATE scheduled_steps
                             SET status = 'processing', locked_until = ?2, updated_at = ?3
                             WHERE id = ?1",
                            params![id, locked_until, now_s],
                        )?;
                        claimed.push(ScheduledStep {
                            status: StepStatus::Processing,
                            ..step
                        });
                    }
                    Err(e) => {
                        warn!(step_id = id, error = %e, "unreadable scheduled step marked failed");
                        tx.execute(
                            "UPDATE scheduled_steps
                             SET status = 'failed', locked_until = NULL, last_error = ?2,
                                 updated_at = ?3
                             WHERE id = ?1",
                            params![id, format!("unreadable row: {e}"), now_s],
                        )?;
                    }
                }
            }
            tx.commit()?;
            Ok(claimed)
        })
        .await
        .map_err(map_tr_err)
}

fn step_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduledStep> {
    Ok(ScheduledStep {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        lead_id: row.get(2)?,
        rule_id: row.get(3)?,
        step_index: row.get(4)?,
        template: row.get(5)?,
        due_at: ts_col(row, 6)?,
        status: enum_col(row, 7)?,
        attempts: row.get(8)?,
        max_attempts: row.get(9)?,
        last_error: row.get(10)?,
    })
}

/// Mark a step as delivered.
pub async fn complete(db: &Database, step_id: i64) -> Result<(), LeadwiseError> {
    let now = format_timestamp(&Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE scheduled_steps
                 SET status = 'completed', locked_until = NULL, updated_at = ?2
                 WHERE id = ?1",
                params![step_id, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record a failed attempt.
///
/// Increments attempts. With `retry_at` and attempts left the step returns to
/// `pending`, due at `retry_at`; otherwise it is marked `failed`.
pub async fn fail(
    db: &Database,
    step_id: i64,
    error: &str,
    retry_at: Option<DateTime<Utc>>,
) -> Result<StepStatus, LeadwiseError> {
    let error = error.to_string();
    let now = format_timestamp(&Utc::now());
    let retry_at = retry_at.map(|at| format_timestamp(&at));
    let status = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let current: Option<(i64, i64)> = tx
                .query_row(
                    "SELECT attempts, max_attempts FROM scheduled_steps WHERE id = ?1",
                    params![step_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((attempts, max_attempts)) = current else {
                tx.commit()?;
                return Ok(None);
            };

            let new_attempts = attempts + 1;
            let status = match &retry_at {
                Some(_) if new_attempts < max_attempts => StepStatus::Pending,
                _ => StepStatus::Failed,
            };
            tx.execute(
                "UPDATE scheduled_steps
                 SET status = ?2, attempts = ?3, last_error = ?4, locked_until = NULL,
                     updated_at = ?5, due_at = COALESCE(?6, due_at)
                 WHERE id = ?1",
                params![
                    step_id,
                    status.to_string(),
                    new_attempts,
                    error,
                    now,
                    retry_at.filter(|_| status == StepStatus::Pending)
                ],
            )?;
            tx.commit()?;
            Ok(Some(status))
        })
        .await
        .map_err(map_tr_err)?;
    status.ok_or_else(|| LeadwiseError::NotFound {
        entity: "scheduled step",
        id: step_id.to_string(),
    })
}

pub async fn release_expired(db: &Database, now: DateTime<Utc>) -> Result<i64, LeadwiseError> {
    let now = format_timestamp(&now);
    let released = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE scheduled_steps
                 SET status = 'pending', locked_until = NULL, updated_at = ?1
                 WHERE status = 'processing' AND locked_until < ?1",
                params![now],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(released as i64)
}

/// Count steps by status for one lead.
pub async fn count_for_lead(
    db: &Database,
    lead_id: &str,
    status: StepStatus,
) -> Result<i64, LeadwiseError> {
    let lead_id = lead_id.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM scheduled_steps WHERE lead_id = ?1 AND status = ?2",
                params![lead_id, status],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}
