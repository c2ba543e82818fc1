// Bulk graph write

use super::*;
use crate::graph::{DependencyGraph, GraphStats};
use anyhow::Result;
use rusqlite::params;
use tracing::{debug, info};

impl GraphDatabase {
    /// Write every node, edge, body and statement of `graph` in one transaction
    pub fn write_graph(&mut self, graph: &DependencyGraph, stats: &GraphStats) -> Result<()> {
        let start_time = std::time::Instant::now();
        info!(
            "Writing graph: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );

        let tx = self.conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO nodes
                 (key, kind, name, schema, source_file, domain, is_stub, attributes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for node in graph.nodes() {
                let attributes = if node.attributes.is_empty() {
                    None
                } else {
                    Some(serde_json::to_string(&node.attributes)?)
                };
                stmt.execute(params![
                    node.key,
                    node.kind.as_str(),
                    node.name,
                    node.schema,
                    node.source_file,
                    node.domain,
                    node.is_stub,
                    attributes
                ])?;
            }
            debug!("Inserted {} nodes", graph.node_count());
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO edges
                 (from_key, to_key, relation, to_kind, source_file, provenance)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for edge in graph.edges() {
                stmt.execute(params![
                    edge.from,
                    edge.to,
                    edge.relation.as_str(),
                    edge.to_kind.as_str(),
                    edge.source_file,
                    edge.provenance_label()
                ])?;
            }
            debug!("Inserted {} edges", graph.edge_count());
        }

        {
            let mut stmt = tx.prepare("INSERT INTO bodies (key, body) VALUES (?1, ?2)")?;
            let mut bodies = 0;
            for node in graph.nodes() {
                if let Some(body) = graph.body(&node.key) {
                    stmt.execute(params![node.key, body])?;
                    bodies += 1;
                }
            }
            debug!("Inserted {} bodies", bodies);
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO statements (source_file, line, method_key, text)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for statement in graph.statements() {
                stmt.execute(params![
                    statement.source_file,
                    statement.line,
                    statement.method_key,
                    statement.text
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare("INSERT INTO run_info (key, value) VALUES (?1, ?2)")?;
            let run_info = [
                ("tool_version", env!("CARGO_PKG_VERSION").to_string()),
                ("created_at", chrono::Utc::now().to_rfc3339()),
                ("default_schema", graph.default_schema().to_string()),
                ("node_count", graph.node_count().to_string()),
                ("edge_count", graph.edge_count().to_string()),
                ("stub_count", stats.stub_nodes.to_string()),
                ("statement_count", stats.statements.to_string()),
                ("files_scanned", stats.files_scanned.to_string()),
                ("files_skipped", stats.files_skipped.to_string()),
            ];
            for (key, value) in &run_info {
                stmt.execute(params![key, value])?;
            }
        }

        tx.commit()?;

        info!(
            "Graph written to {} in {:.2}ms",
            self.file_path.display(),
            start_time.elapsed().as_secs_f64() * 1000.0
        );
        Ok(())
    }
}
