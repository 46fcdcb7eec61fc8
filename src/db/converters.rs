//! Row-to-struct converters for database queries.

use rusqlite::Row;

use crate::types::{EdgeKind, GraphEdge, GraphNode, NodeKind, Tenant};

// ---------------------------------------------------------------------------
// Node conversion
// ---------------------------------------------------------------------------

/// Convert a `SELECT * FROM nodes` row into a [`GraphNode`].
pub fn row_to_graph_node(row: &Row<'_>) -> rusqlite::Result<GraphNode> {
    let id: String = row.get("id")?;
    let user_id: String = row.get("user_id")?;
    let project_id: String = row.get("project_id")?;
    let file_path: String = row.get("file_path")?;
    let kind_str: String = row.get("kind")?;
    let name: String = row.get("name")?;
    let node_type: Option<String> = row.get("node_type")?;
    let node_path: Option<String> = row.get("node_path")?;
    let start_line: Option<u32> = row.get("start_line")?;
    let end_line: Option<u32> = row.get("end_line")?;
    let updated_at: f64 = row.get("updated_at")?;

    Ok(GraphNode {
        id,
        tenant: Tenant::new(user_id, project_id),
        file_path,
        kind: NodeKind::from_str_loose(&kind_str).unwrap_or(NodeKind::File),
        name,
        node_type,
        node_path,
        start_line,
        end_line,
        updated_at,
    })
}

// ---------------------------------------------------------------------------
// Edge conversion
// ---------------------------------------------------------------------------

/// Convert a `SELECT * FROM edges` row into a [`GraphEdge`].
pub fn row_to_graph_edge(row: &Row<'_>) -> rusqlite::Result<GraphEdge> {
    let user_id: String = row.get("user_id")?;
    let project_id: String = row.get("project_id")?;
    let source_id: String = row.get("source_id")?;
    let target_id: String = row.get("target_id")?;
    let kind_str: String = row.get("kind")?;
    let file_path: String = row.get("file_path")?;
    let start_line: Option<u32> = row.get("start_line")?;
    let end_line: Option<u32> = row.get("end_line")?;
    let strength: f64 = row.get("strength")?;
    let updated_at: f64 = row.get("updated_at")?;

    Ok(GraphEdge {
        tenant: Tenant::new(user_id, project_id),
        source_id,
        target_id,
        kind: EdgeKind::from_label(&kind_str).unwrap_or(EdgeKind::UsesResource),
        file_path,
        start_line,
        end_line,
        strength,
        updated_at,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
