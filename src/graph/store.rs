//! SQLite CRUD layer for the project graph.
//!
//! Every query goes through [`rusqlite::Connection::prepare_cached`], so
//! the first call compiles the statement and subsequent calls reuse it.
//! All reads and writes are tenant-scoped.

use std::collections::{HashMap, HashSet};

use rusqlite::{params, Connection};

use crate::db::converters::{row_to_graph_edge, row_to_graph_node};
use crate::error::Result;
use crate::types::{GraphEdge, GraphNode, Tenant};

// ---------------------------------------------------------------------------
// GraphStats
// ---------------------------------------------------------------------------

/// Aggregate statistics about a tenant's graph.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub files: usize,
    pub node_kinds: HashMap<String, usize>,
    pub edge_kinds: HashMap<String, usize>,
}

// ---------------------------------------------------------------------------
// SQL constants
// ---------------------------------------------------------------------------

const UPSERT_NODE_SQL: &str = "\
INSERT INTO nodes (id, user_id, project_id, file_path, kind, name,
                   node_type, node_path, start_line, end_line, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
ON CONFLICT(id) DO UPDATE SET
  file_path = excluded.file_path,
  kind = excluded.kind,
  name = excluded.name,
  node_type = excluded.node_type,
  node_path = excluded.node_path,
  start_line = excluded.start_line,
  end_line = excluded.end_line,
  updated_at = excluded.updated_at";

const UPSERT_EDGE_SQL: &str = "\
INSERT INTO edges (user_id, project_id, source_id, target_id, kind,
                   file_path, start_line, end_line, strength, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
ON CONFLICT(user_id, project_id, source_id, target_id, kind) DO UPDATE SET
  file_path = excluded.file_path,
  start_line = excluded.start_line,
  end_line = excluded.end_line,
  strength = excluded.strength,
  updated_at = excluded.updated_at";

const DELETE_NODES_BY_FILE_SQL: &str = "\
DELETE FROM nodes WHERE user_id = ?1 AND project_id = ?2 AND file_path = ?3";

const DELETE_EDGES_BY_FILE_SQL: &str = "\
DELETE FROM edges WHERE user_id = ?1 AND project_id = ?2 AND file_path = ?3";

const SELECT_NODES_BY_FILE_SQL: &str = "\
SELECT * FROM nodes WHERE user_id = ?1 AND project_id = ?2 AND file_path = ?3";

const SELECT_OUT_EDGES_SQL: &str = "\
SELECT * FROM edges WHERE user_id = ?1 AND project_id = ?2 AND source_id = ?3";

const SELECT_IN_EDGES_SQL: &str = "\
SELECT * FROM edges WHERE user_id = ?1 AND project_id = ?2 AND target_id = ?3";

const SELECT_ALL_NODES_SQL: &str = "\
SELECT * FROM nodes WHERE user_id = ?1 AND project_id = ?2";

const SELECT_ALL_EDGES_SQL: &str = "\
SELECT * FROM edges WHERE user_id = ?1 AND project_id = ?2";

const DISTINCT_NODE_FILES_SQL: &str = "\
SELECT DISTINCT file_path FROM nodes WHERE user_id = ?1 AND project_id = ?2";

const CLEAR_NODES_SQL: &str = "DELETE FROM nodes WHERE user_id = ?1 AND project_id = ?2";
const CLEAR_EDGES_SQL: &str = "DELETE FROM edges WHERE user_id = ?1 AND project_id = ?2";

// ---------------------------------------------------------------------------
// GraphStore
// ---------------------------------------------------------------------------

/// Tenant-scoped persistence for graph nodes and edges.
pub struct GraphStore<'a> {
    conn: &'a Connection,
}

impl<'a> GraphStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // -------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------

    /// Batch-upsert nodes inside a single transaction.
    pub fn upsert_nodes(&self, nodes: &[GraphNode]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_NODE_SQL)?;
            for node in nodes {
                stmt.execute(params![
                    node.id,
                    node.tenant.user_id,
                    node.tenant.project_id,
                    node.file_path,
                    node.kind.as_str(),
                    node.name,
                    node.node_type,
                    node.node_path,
                    node.start_line,
                    node.end_line,
                    node.updated_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Batch-upsert edges inside a single transaction.
    pub fn upsert_edges(&self, edges: &[GraphEdge]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_EDGE_SQL)?;
            for edge in edges {
                stmt.execute(params![
                    edge.tenant.user_id,
                    edge.tenant.project_id,
                    edge.source_id,
                    edge.target_id,
                    edge.kind.label(),
                    edge.file_path,
                    edge.start_line,
                    edge.end_line,
                    edge.strength,
                    edge.updated_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Atomically replace a file's graph contribution: delete every node
    /// and edge declared by `file_path`, then insert the new ones.
    pub fn replace_file_graph(
        &self,
        tenant: &Tenant,
        file_path: &str,
        nodes: &[GraphNode],
        edges: &[GraphEdge],
    ) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            tx.prepare_cached(DELETE_EDGES_BY_FILE_SQL)?
                .execute(params![tenant.user_id, tenant.project_id, file_path])?;
            tx.prepare_cached(DELETE_NODES_BY_FILE_SQL)?
                .execute(params![tenant.user_id, tenant.project_id, file_path])?;

            let mut ins_node = tx.prepare_cached(UPSERT_NODE_SQL)?;
            for node in nodes {
                ins_node.execute(params![
                    node.id,
                    node.tenant.user_id,
                    node.tenant.project_id,
                    node.file_path,
                    node.kind.as_str(),
                    node.name,
                    node.node_type,
                    node.node_path,
                    node.start_line,
                    node.end_line,
                    node.updated_at,
                ])?;
            }

            let mut ins_edge = tx.prepare_cached(UPSERT_EDGE_SQL)?;
            for edge in edges {
                ins_edge.execute(params![
                    edge.tenant.user_id,
                    edge.tenant.project_id,
                    edge.source_id,
                    edge.target_id,
                    edge.kind.label(),
                    edge.file_path,
                    edge.start_line,
                    edge.end_line,
                    edge.strength,
                    edge.updated_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete all graph data declared by `file_path`.
    pub fn delete_file(&self, tenant: &Tenant, file_path: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            tx.prepare_cached(DELETE_EDGES_BY_FILE_SQL)?
                .execute(params![tenant.user_id, tenant.project_id, file_path])?;
            tx.prepare_cached(DELETE_NODES_BY_FILE_SQL)?
                .execute(params![tenant.user_id, tenant.project_id, file_path])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Remove graph data for files missing from `present_paths`; returns
    /// the number of file paths cleaned up.
    pub fn sweep_missing(&self, tenant: &Tenant, present_paths: &HashSet<String>) -> Result<usize> {
        let indexed: Vec<String> = {
            let mut stmt = self.conn.prepare_cached(DISTINCT_NODE_FILES_SQL)?;
            let rows = stmt.query_map(params![tenant.user_id, tenant.project_id], |row| {
                row.get::<_, String>(0)
            })?;
            rows.filter_map(|r| r.ok()).collect()
        };

        let mut removed = 0usize;
        for path in indexed {
            if !present_paths.contains(&path) {
                self.delete_file(tenant, &path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Drop every node and edge for the tenant.
    pub fn clear(&self, tenant: &Tenant) -> Result<()> {
        self.conn
            .prepare_cached(CLEAR_EDGES_SQL)?
            .execute(params![tenant.user_id, tenant.project_id])?;
        self.conn
            .prepare_cached(CLEAR_NODES_SQL)?
            .execute(params![tenant.user_id, tenant.project_id])?;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// Look up a node by id, tenant-checked.
    pub fn node_by_id(&self, tenant: &Tenant, id: &str) -> Result<Option<GraphNode>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT * FROM nodes WHERE id = ?1 AND user_id = ?2 AND project_id = ?3",
        )?;
        let mut rows = stmt.query_and_then(
            params![id, tenant.user_id, tenant.project_id],
            row_to_graph_node,
        )?;
        match rows.next() {
            Some(node) => Ok(Some(node?)),
            None => Ok(None),
        }
    }

    /// All nodes declared by one file.
    pub fn nodes_by_file(&self, tenant: &Tenant, file_path: &str) -> Result<Vec<GraphNode>> {
        let mut stmt = self.conn.prepare_cached(SELECT_NODES_BY_FILE_SQL)?;
        let rows = stmt.query_and_then(
            params![tenant.user_id, tenant.project_id, file_path],
            row_to_graph_node,
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Outgoing edges from a node.
    pub fn out_edges(&self, tenant: &Tenant, node_id: &str) -> Result<Vec<GraphEdge>> {
        let mut stmt = self.conn.prepare_cached(SELECT_OUT_EDGES_SQL)?;
        let rows = stmt.query_and_then(
            params![tenant.user_id, tenant.project_id, node_id],
            row_to_graph_edge,
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Incoming edges to a node.
    pub fn in_edges(&self, tenant: &Tenant, node_id: &str) -> Result<Vec<GraphEdge>> {
        let mut stmt = self.conn.prepare_cached(SELECT_IN_EDGES_SQL)?;
        let rows = stmt.query_and_then(
            params![tenant.user_id, tenant.project_id, node_id],
            row_to_graph_edge,
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Every node in the tenant's graph.
    pub fn all_nodes(&self, tenant: &Tenant) -> Result<Vec<GraphNode>> {
        let mut stmt = self.conn.prepare_cached(SELECT_ALL_NODES_SQL)?;
        let rows = stmt.query_and_then(
            params![tenant.user_id, tenant.project_id],
            row_to_graph_node,
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Every edge in the tenant's graph.
    pub fn all_edges(&self, tenant: &Tenant) -> Result<Vec<GraphEdge>> {
        let mut stmt = self.conn.prepare_cached(SELECT_ALL_EDGES_SQL)?;
        let rows = stmt.query_and_then(
            params![tenant.user_id, tenant.project_id],
            row_to_graph_edge,
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Aggregate counts and kind distributions.
    pub fn stats(&self, tenant: &Tenant) -> Result<GraphStats> {
        let nodes = self.all_nodes(tenant)?;
        let edges = self.all_edges(tenant)?;

        let mut node_kinds: HashMap<String, usize> = HashMap::new();
        let mut files: HashSet<&str> = HashSet::new();
        for node in &nodes {
            *node_kinds.entry(node.kind.as_str().to_string()).or_default() += 1;
            files.insert(node.file_path.as_str());
        }

        let mut edge_kinds: HashMap<String, usize> = HashMap::new();
        for edge in &edges {
            *edge_kinds
                .entry(edge.kind.relationship().to_string())
                .or_default() += 1;
        }

        Ok(GraphStats {
            nodes: nodes.len(),
            edges: edges.len(),
            files: files.len(),
            node_kinds,
            edge_kinds,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
