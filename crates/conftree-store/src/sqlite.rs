//! SQLite-backed node store
//!
//! Conditional writes are single `UPDATE ... WHERE version = ?` statements,
//! so the version check and the write cannot interleave with another
//! connection's write.

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use conftree_core::errors::ConfigError;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::db;
use crate::errors::{corrupt_payload, domain, from_rusqlite, Result};
use crate::migrations::apply_migrations;
use crate::node_store::{cas_failure, NodeStore, StoredKind, StoredNode};

const COLUMNS: &str = "key, parent_key, name, kind, value_json, version, transaction_id, \
                       owner, description, updated_at, deleted, seq";

/// Descendant match that avoids LIKE, whose `_` wildcard also matches names
const SUBTREE: &str = "(key = ?1 OR substr(key, 1, length(?1) + 1) = ?1 || '/')";

#[derive(Debug)]
pub struct SqliteNodeStore {
    conn: Connection,
    in_transaction: bool,
}

impl SqliteNodeStore {
    /// Open (or create) a store file and bring its schema up to date
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = db::open(path)?;
        db::configure(&conn)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(db::open_in_memory()?)
    }

    /// Wrap an existing connection, applying pending migrations
    pub fn from_connection(mut conn: Connection) -> Result<Self> {
        apply_migrations(&mut conn)?;
        Ok(Self {
            conn,
            in_transaction: false,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Number of rows, tombstoned ones included
    pub fn row_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM config_nodes", [], |row| row.get(0))
            .map_err(from_rusqlite)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn decode(raw: RawRow) -> Result<StoredNode> {
        let kind = StoredKind::parse(&raw.kind)?;
        let value =
            serde_json::from_str(&raw.value_json).map_err(|e| corrupt_payload(&raw.key, e))?;
        Ok(StoredNode {
            key: raw.key,
            parent_key: raw.parent_key,
            name: raw.name,
            kind,
            value,
            version: raw.version,
            transaction_id: raw.transaction_id,
            owner: raw.owner,
            description: raw.description,
            updated_at: DateTime::from_timestamp(raw.updated_at, 0).unwrap_or_else(Utc::now),
            deleted: raw.deleted != 0,
            seq: raw.seq,
        })
    }
}

/// Column values before payload and kind decoding
struct RawRow {
    key: String,
    parent_key: Option<String>,
    name: String,
    kind: String,
    value_json: String,
    version: String,
    transaction_id: Option<String>,
    owner: Option<String>,
    description: Option<String>,
    updated_at: i64,
    deleted: i64,
    seq: i64,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            parent_key: row.get(1)?,
            name: row.get(2)?,
            kind: row.get(3)?,
            value_json: row.get(4)?,
            version: row.get(5)?,
            transaction_id: row.get(6)?,
            owner: row.get(7)?,
            description: row.get(8)?,
            updated_at: row.get(9)?,
            deleted: row.get(10)?,
            seq: row.get(11)?,
        })
    }
}

impl NodeStore for SqliteNodeStore {
    fn read(&self, key: &str) -> Result<Option<StoredNode>> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {} FROM config_nodes WHERE key = ?1", COLUMNS),
                [key],
                RawRow::from_row,
            )
            .optional()
            .map_err(from_rusqlite)?;
        raw.map(Self::decode).transpose()
    }

    fn create(&mut self, node: StoredNode) -> Result<()> {
        if self.read(&node.key)?.is_some_and(|n| n.is_live()) {
            return Err(domain(
                "store_create",
                ConfigError::AlreadyExists {
                    path: node.key.clone(),
                },
            ));
        }
        self.conn
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO config_nodes ({}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11)",
                    COLUMNS
                ),
                params![
                    node.key,
                    node.parent_key,
                    node.name,
                    node.kind.as_str(),
                    node.value.to_string(),
                    node.version,
                    node.transaction_id,
                    node.owner,
                    node.description,
                    node.updated_at.timestamp(),
                    node.seq,
                ],
            )
            .map_err(from_rusqlite)?;
        tracing::debug!(key = %node.key, kind = node.kind.as_str(), "node created");
        Ok(())
    }

    fn compare_and_set(&mut self, expected_version: &str, node: StoredNode) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE config_nodes SET value_json = ?3, version = ?4, transaction_id = ?5, \
                 owner = ?6, description = ?7, updated_at = ?8 \
                 WHERE key = ?1 AND version = ?2 AND deleted = 0",
                params![
                    node.key,
                    expected_version,
                    node.value.to_string(),
                    node.version,
                    node.transaction_id,
                    node.owner,
                    node.description,
                    node.updated_at.timestamp(),
                ],
            )
            .map_err(from_rusqlite)?;
        if changed == 0 {
            let current = self.read(&node.key)?;
            return Err(cas_failure(
                "store_compare_and_set",
                &node.key,
                expected_version,
                current.as_ref(),
            ));
        }
        tracing::debug!(key = %node.key, version = %node.version, "node updated");
        Ok(())
    }

    fn tombstone(
        &mut self,
        key: &str,
        expected_version: &str,
        version: &str,
        transaction_id: Option<&str>,
    ) -> Result<usize> {
        let current = self.read(key)?;
        match &current {
            Some(node) if node.is_live() && node.version == expected_version => {}
            _ => return Err(cas_failure("store_tombstone", key, expected_version, current.as_ref())),
        }
        let changed = self
            .conn
            .execute(
                &format!(
                    "UPDATE config_nodes SET deleted = 1, version = ?2, transaction_id = ?3, \
                     updated_at = ?4 WHERE deleted = 0 AND {}",
                    SUBTREE
                ),
                params![key, version, transaction_id, Utc::now().timestamp()],
            )
            .map_err(from_rusqlite)?;
        tracing::debug!(key, rows = changed, "subtree tombstoned");
        Ok(changed)
    }

    fn remove_subtree(&mut self, key: &str, expected_version: &str) -> Result<usize> {
        let current = self.read(key)?;
        match &current {
            Some(node) if node.is_live() && node.version == expected_version => {}
            _ => {
                return Err(cas_failure(
                    "store_remove_subtree",
                    key,
                    expected_version,
                    current.as_ref(),
                ))
            }
        }
        let removed = self
            .conn
            .execute(&format!("DELETE FROM config_nodes WHERE {}", SUBTREE), [key])
            .map_err(from_rusqlite)?;
        tracing::debug!(key, rows = removed, "subtree removed");
        Ok(removed)
    }

    fn children(&self, parent_key: &str) -> Result<Vec<StoredNode>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM config_nodes WHERE parent_key = ?1 AND deleted = 0 \
                 ORDER BY seq, key",
                COLUMNS
            ))
            .map_err(from_rusqlite)?;
        let rows = stmt
            .query_map([parent_key], RawRow::from_row)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        rows.into_iter().map(Self::decode).collect()
    }

    fn begin(&mut self) -> Result<()> {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(from_rusqlite)?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT").map_err(from_rusqlite)?;
            self.in_transaction = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.in_transaction {
            self.conn.execute_batch("ROLLBACK").map_err(from_rusqlite)?;
            self.in_transaction = false;
        }
        Ok(())
    }
}
