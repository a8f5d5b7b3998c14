// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation message log.

use leadwise_core::LeadwiseError;
use leadwise_core::types::{MessageRecord, format_timestamp};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::{enum_col, ts_col};

/// Insert a new message.
pub async fn insert_message(db: &Database, msg: &MessageRecord) -> Result<(), LeadwiseError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, tenant_id, lead_id, external_id, sender, recipient,
                     body, content_type, direction, timestamp, media_url, automated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    msg.id,
                    msg.tenant_id,
                    msg.lead_id,
                    msg.external_id,
                    msg.sender,
                    msg.recipient,
                    msg.body,
                    msg.content_type.to_string(),
                    msg.direction.to_string(),
                    format_timestamp(&msg.timestamp),
                    msg.media_url,
                    msg.automated,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Whether an inbound message with this transport id is already logged.
pub async fn has_inbound_message(
    db: &Database,
    tenant_id: &str,
    external_id: &str,
) -> Result<bool, LeadwiseError> {
    let tenant_id = tenant_id.to_string();
    let external_id = external_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM messages
                     WHERE tenant_id = ?1 AND external_id = ?2 AND direction = 'inbound')",
                params![tenant_id, external_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// The `limit` most recent messages of a lead, newest first.
pub async fn recent_messages(
    db: &Database,
    tenant_id: &str,
    lead_id: &str,
    limit: i64,
) -> Result<Vec<MessageRecord>, LeadwiseError> {
    let tenant_id = tenant_id.to_string();
    let lead_id = lead_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, lead_id, external_id, sender, recipient, body,
                        content_type, direction, timestamp, media_url, automated
                 FROM messages
                 WHERE tenant_id = ?1 AND lead_id = ?2
                 ORDER BY timestamp DESC, rowid DESC
                 LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![tenant_id, lead_id, limit], |row| {
                Ok(MessageRecord {
                    id: row.get(0)?,
                    tenant_id: row.get(1)?,
                    lead_id: row.get(2)?,
                    external_id: row.get(3)?,
                    sender: row.get(4)?,
                    recipient: row.get(5)?,
                    body: row.get(6)?,
                    content_type: enum_col(row, 7)?,
                    direction: enum_col(row, 8)?,
                    timestamp: ts_col(row, 9)?,
                    media_url: row.get(10)?,
                    automated: row.get(11)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
