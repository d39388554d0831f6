// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Audit trail: append-only SQLite log of seal, verify, unwrap and open
// outcomes.
//
// Schema:
//   audit_log(
//     id               INTEGER PRIMARY KEY AUTOINCREMENT,
//     timestamp        TEXT    NOT NULL,   -- RFC 3339
//     action           TEXT    NOT NULL,   -- "seal", "verify", "unwrap", "open"
//     asset_identifier TEXT    NOT NULL,
//     success          INTEGER NOT NULL,   -- 0 = failure, 1 = success
//     details          TEXT                -- counts, never key material
//   )

use std::fmt;
use std::path::Path;

use chrono::Utc;
use pixelveil_core::error::{PixelveilError, Result};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS audit_log (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp        TEXT    NOT NULL,
    action           TEXT    NOT NULL,
    asset_identifier TEXT    NOT NULL,
    success          INTEGER NOT NULL,
    details          TEXT
);
CREATE INDEX IF NOT EXISTS audit_log_asset ON audit_log(asset_identifier);";

fn db_err(e: rusqlite::Error) -> PixelveilError {
    PixelveilError::Database(e.to_string())
}

/// Security-relevant operations recorded in the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Seal,
    /// Envelope integrity and package format checks on the receiving side.
    Verify,
    Unwrap,
    Open,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seal => "seal",
            Self::Verify => "verify",
            Self::Unwrap => "unwrap",
            Self::Open => "open",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: String,
    pub action: String,
    pub asset_identifier: String,
    pub success: bool,
    pub details: Option<String>,
}

impl AuditEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            action: row.get(2)?,
            asset_identifier: row.get(3)?,
            success: row.get::<_, i32>(4)? != 0,
            details: row.get(5)?,
        })
    }
}

/// Append-only audit log.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) the audit database at `path` in WAL mode.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        debug!("audit log opened");
        Ok(Self { conn })
    }

    /// Trail backed by a private in-memory database.  Nothing is persisted.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        debug!("in-memory audit log opened");
        Ok(Self { conn })
    }

    #[instrument(skip(self, details), fields(%action, %asset_identifier, success))]
    pub fn record(
        &self,
        action: AuditAction,
        asset_identifier: &str,
        success: bool,
        details: Option<&str>,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO audit_log (timestamp, action, asset_identifier, success, details)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    Utc::now().to_rfc3339(),
                    action.as_str(),
                    asset_identifier,
                    success as i32,
                    details
                ],
            )
            .map_err(db_err)?;
        debug!("audit entry recorded");
        Ok(())
    }

    /// All entries for one asset, oldest first.
    pub fn entries_for_asset(&self, asset_identifier: &str) -> Result<Vec<AuditEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, timestamp, action, asset_identifier, success, details
                 FROM audit_log
                 WHERE asset_identifier = ?1
                 ORDER BY id ASC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![asset_identifier], AuditEntry::from_row)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// The newest `limit` entries, newest first.
    pub fn recent_entries(&self, limit: u32) -> Result<Vec<AuditEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, timestamp, action, asset_identifier, success, details
                 FROM audit_log
                 ORDER BY id DESC
                 LIMIT ?1",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![limit], AuditEntry::from_row)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// Total number of entries across all assets.
    pub fn count(&self) -> Result<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))
            .map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_log() -> AuditLog {
        AuditLog::open_in_memory().expect("open in-memory audit log")
    }

    #[test]
    fn record_and_count() {
        let log = make_log();
        assert_eq!(log.count().unwrap(), 0);
        log.record(AuditAction::Seal, "asset-1", true, Some("3 regions"))
            .unwrap();
        log.record(AuditAction::Open, "asset-1", true, None).unwrap();
        assert_eq!(log.count().unwrap(), 2);
    }

    #[test]
    fn entries_are_keyed_by_asset() {
        let log = make_log();
        log.record(AuditAction::Seal, "aaa", true, None).unwrap();
        log.record(AuditAction::Seal, "bbb", true, None).unwrap();
        log.record(AuditAction::Unwrap, "aaa", false, Some("key unwrap failed"))
            .unwrap();

        let entries = log.entries_for_asset("aaa").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "seal");
        assert!(entries[0].success);
        assert_eq!(entries[1].action, "unwrap");
        assert!(!entries[1].success);
        assert_eq!(entries[1].details.as_deref(), Some("key unwrap failed"));
    }

    #[test]
    fn recent_entries_newest_first() {
        let log = make_log();
        for i in 0..5 {
            log.record(AuditAction::Open, &format!("asset-{i}"), true, None)
                .unwrap();
        }
        let recent = log.recent_entries(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent[0].id > recent[1].id && recent[1].id > recent[2].id);
        assert_eq!(recent[0].asset_identifier, "asset-4");
    }

    #[test]
    fn file_backed_log_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.db");
        {
            let log = AuditLog::open(&path).unwrap();
            log.record(AuditAction::Seal, "asset", true, None).unwrap();
        }
        let log = AuditLog::open(&path).unwrap();
        assert_eq!(log.count().unwrap(), 1);
    }
}
