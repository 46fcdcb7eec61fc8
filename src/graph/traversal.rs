//! Bounded graph traversal.
//!
//! Breadth-first expansion from a file's nodes in both edge directions,
//! grouping neighbors by `uses_<relationship>` / `used_by_<relationship>`.
//! A visited set makes cyclic graphs safe, and branching stops once
//! `max_depth` is reached.

use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::error::Result;
use crate::graph::store::GraphStore;
use crate::types::{GraphNode, NodeKind, Tenant};

/// Connected neighbors grouped by relationship label. Keys are
/// `uses_<relationship>` for outgoing edges and `used_by_<relationship>`
/// for incoming ones; values are display addresses (file paths, or
/// `file::node_path` for scene nodes).
pub type ConnectionMap = BTreeMap<String, Vec<String>>;

/// Breadth-first traversal over a tenant's stored graph.
pub struct GraphTraversal<'a> {
    store: &'a GraphStore<'a>,
}

impl<'a> GraphTraversal<'a> {
    pub fn new(store: &'a GraphStore<'a>) -> Self {
        Self { store }
    }

    /// All nodes connected to `file_path`'s nodes within `max_depth` hops.
    ///
    /// Returns an empty map when the file has no graph presence. Nodes
    /// already visited in this traversal are never re-expanded, so cycles
    /// terminate.
    pub fn connected_files(
        &self,
        tenant: &Tenant,
        file_path: &str,
        max_depth: usize,
    ) -> Result<ConnectionMap> {
        let start_nodes = self.store.nodes_by_file(tenant, file_path)?;
        if start_nodes.is_empty() {
            return Ok(ConnectionMap::new());
        }

        let mut connected = ConnectionMap::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();

        for node in &start_nodes {
            visited.insert(node.id.clone());
            queue.push_back((node.id.clone(), 0));
        }

        while let Some((current_id, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }

            for edge in self.store.out_edges(tenant, &current_id)? {
                let label = format!("uses_{}", edge.kind.relationship());
                if let Some(neighbor) = self.store.node_by_id(tenant, &edge.target_id)? {
                    push_unique(&mut connected, &label, display_address(&neighbor));
                    if visited.insert(neighbor.id.clone()) {
                        queue.push_back((neighbor.id, depth + 1));
                    }
                }
            }

            for edge in self.store.in_edges(tenant, &current_id)? {
                let label = format!("used_by_{}", edge.kind.relationship());
                if let Some(neighbor) = self.store.node_by_id(tenant, &edge.source_id)? {
                    push_unique(&mut connected, &label, display_address(&neighbor));
                    if visited.insert(neighbor.id.clone()) {
                        queue.push_back((neighbor.id, depth + 1));
                    }
                }
            }
        }

        Ok(connected)
    }
}

/// Human-readable address for a traversal result.
fn display_address(node: &GraphNode) -> String {
    match (node.kind, node.node_path.as_deref()) {
        (NodeKind::SceneNode, Some(path)) => format!("{}::{}", node.file_path, path),
        _ => node.file_path.clone(),
    }
}

fn push_unique(map: &mut ConnectionMap, label: &str, address: String) {
    let entries = map.entry(label.to_string()).or_default();
    if !entries.contains(&address) {
        entries.push(address);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
