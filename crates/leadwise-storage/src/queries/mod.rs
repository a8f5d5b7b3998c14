// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for CRUD operations on storage entities.

pub mod escalations;
pub mod leads;
pub mod messages;
pub mod rules;
pub mod steps;
pub mod tasks;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;

/// Reads a stored timestamp column.
pub(crate) fn ts_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(&raw, idx)
}

/// Reads a nullable stored timestamp column.
pub(crate) fn opt_ts_col(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_ts(&s, idx)).transpose()
}

fn parse_ts(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Reads a text column holding a strum-serialized enum.
pub(crate) fn enum_col<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    T::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Reads a text column holding JSON.
pub(crate) fn json_col<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Serializes a value for a JSON text column.
pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, leadwise_core::LeadwiseError> {
    serde_json::to_string(value).map_err(leadwise_core::LeadwiseError::storage)
}

/// Shared fixtures for query tests.
#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Utc};
    use leadwise_core::types::{LeadUpsert, NewContact};
    use tempfile::TempDir;

    use crate::database::Database;

    pub async fn setup_db() -> (Database, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    pub fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    pub fn contact(tenant: &str, phone: &str) -> NewContact {
        NewContact {
            tenant_id: tenant.to_string(),
            phone_number: phone.to_string(),
            name: phone.to_string(),
            source: "whatsapp".to_string(),
            initial_score: 10,
            first_message: "Hi there".to_string(),
            contacted_at: at("2026-03-01T10:00:00Z"),
        }
    }

    pub async fn seed_lead(db: &Database, tenant: &str, phone: &str) -> LeadUpsert {
        crate::queries::leads::upsert_contact(db, &contact(tenant, phone))
            .await
            .unwrap()
    }
}
