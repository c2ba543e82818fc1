//! Graph database - SQLite artifact of one graph run
//!
//! The file is recreated on every run; nothing is migrated or updated in place.

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};
use tracing::info;

mod bulk_operations;
mod schema;

/// Edge row as stored, for verification reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEdge {
    pub from_key: String,
    pub to_key: String,
    pub relation: String,
    pub to_kind: String,
    pub provenance: String,
}

pub struct GraphDatabase {
    pub(crate) conn: Connection,
    pub(crate) file_path: PathBuf,
}

impl GraphDatabase {
    /// Remove any existing file at `db_path` and create an empty graph database
    pub fn create<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let file_path = db_path.as_ref().to_path_buf();

        if file_path.exists() {
            std::fs::remove_file(&file_path)
                .with_context(|| format!("Failed to remove existing {}", file_path.display()))?;
        }
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        info!("Creating graph database at: {}", file_path.display());
        let conn =
            Connection::open(&file_path).map_err(|e| anyhow!("Failed to open database: {}", e))?;

        let mut db = Self { conn, file_path };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Open an existing graph database for reading
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let file_path = db_path.as_ref().to_path_buf();
        let conn = Connection::open(&file_path)
            .with_context(|| format!("Failed to open {}", file_path.display()))?;
        Ok(Self { conn, file_path })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn node_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn edge_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn stub_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE is_stub = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Outgoing edges of `key` (case-insensitive), ordered by target and relation
    pub fn edges_from(&self, key: &str) -> Result<Vec<StoredEdge>> {
        let mut stmt = self.conn.prepare(
            "SELECT from_key, to_key, relation, to_kind, provenance
             FROM edges
             WHERE from_key = ?1 COLLATE NOCASE
             ORDER BY to_key, relation",
        )?;
        let rows = stmt.query_map(params![key], |row| {
            Ok(StoredEdge {
                from_key: row.get(0)?,
                to_key: row.get(1)?,
                relation: row.get(2)?,
                to_kind: row.get(3)?,
                provenance: row.get(4)?,
            })
        })?;

        let mut edges = Vec::new();
        for edge in rows {
            edges.push(edge?);
        }
        Ok(edges)
    }

    /// Definition text stored for `key`
    pub fn body(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM bodies WHERE key = ?1 COLLATE NOCASE")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    pub fn run_info(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM run_info WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}
