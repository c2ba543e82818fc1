// Graph database schema

use super::*;
use anyhow::Result;
use tracing::debug;

impl GraphDatabase {
    pub(super) fn initialize_schema(&mut self) -> Result<()> {
        debug!("Creating graph schema");

        self.create_nodes_table()?;
        self.create_edges_table()?;
        self.create_bodies_table()?;
        self.create_statements_table()?;
        self.create_run_info_table()?;

        debug!("Graph schema created successfully");
        Ok(())
    }

    fn create_nodes_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS nodes (
                key TEXT PRIMARY KEY COLLATE NOCASE,
                kind TEXT NOT NULL,
                name TEXT NOT NULL,
                schema TEXT,
                source_file TEXT,
                domain TEXT,
                is_stub INTEGER NOT NULL DEFAULT 0,
                attributes TEXT
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_nodes_kind ON nodes(kind)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_nodes_name ON nodes(name COLLATE NOCASE)",
            [],
        )?;

        debug!("Created nodes table and indexes");
        Ok(())
    }

    fn create_edges_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS edges (
                from_key TEXT NOT NULL COLLATE NOCASE,
                to_key TEXT NOT NULL COLLATE NOCASE,
                relation TEXT NOT NULL,
                to_kind TEXT NOT NULL,
                source_file TEXT,
                provenance TEXT NOT NULL,
                PRIMARY KEY (from_key, to_key, relation)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_key)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_edges_relation ON edges(relation)",
            [],
        )?;

        debug!("Created edges table and indexes");
        Ok(())
    }

    fn create_bodies_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS bodies (
                key TEXT PRIMARY KEY COLLATE NOCASE,
                body TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Statement snippets that referenced no database object
    fn create_statements_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS statements (
                source_file TEXT NOT NULL,
                line INTEGER NOT NULL,
                method_key TEXT NOT NULL,
                text TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_statements_file ON statements(source_file, line)",
            [],
        )?;
        Ok(())
    }

    fn create_run_info_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS run_info (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }
}
