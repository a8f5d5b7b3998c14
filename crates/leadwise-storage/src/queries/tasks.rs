// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow-up tasks.

use leadwise_core::LeadwiseError;
use leadwise_core::types::{Task, format_timestamp};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Insert a new task.
pub async fn create_task(db: &Database, task: &Task) -> Result<(), LeadwiseError> {
    let task = task.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tasks (id, tenant_id, lead_id, title, description, assignee, due_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    task.id,
                    task.tenant_id,
                    task.lead_id,
                    task.title,
                    task.description,
                    task.assignee,
                    task.due_at.as_ref().map(format_timestamp),
                    format_timestamp(&task.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Tasks of a tenant, newest first.
pub async fn list_tasks(db: &Database, tenant_id: &str) -> Result<Vec<Task>, LeadwiseError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, lead_id, title, description, assignee, due_at, created_at
                 FROM tasks WHERE tenant_id = ?1
                 ORDER BY created_at DESC",
            )?;
            let rows = stmt.query_map(params![tenant_id], |row| {
                Ok(Task {
                    id: row.get(0)?,
                    tenant_id: row.get(1)?,
                    lead_id: row.get(2)?,
                    title: row.get(3)?,
                    description: row.get(4)?,
                    assignee: row.get(5)?,
                    due_at: crate::queries::opt_ts_col(row, 6)?,
                    created_at: crate::queries::ts_col(row, 7)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
