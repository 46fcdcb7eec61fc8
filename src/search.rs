//! Graph-augmented similarity search.
//!
//! Composes the vector store with the tenant's graph: every search runs a
//! cosine similarity query; graph-augmented searches additionally attach
//! each hit's connected files (bounded BFS) and the tenant's most central
//! files.

use rusqlite::Connection;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{Result, SceneGraphError};
use crate::graph::centrality;
use crate::graph::store::GraphStore;
use crate::graph::traversal::{ConnectionMap, GraphTraversal};
use crate::index::embedder::EmbeddingClient;
use crate::types::{FileCategory, NodeKind, Tenant};
use crate::vector::{SearchHit, VectorStore};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Options for one search call.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum similarity hits to return.
    pub k: usize,
    /// Attach graph context (connections + central files) to the result.
    pub with_graph: bool,
    /// Restrict hits to one file category.
    pub category: Option<FileCategory>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            k: 5,
            with_graph: false,
            category: None,
        }
    }
}

/// A file ranked by blended centrality.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CentralFile {
    pub file_path: String,
    pub score: f64,
}

/// The composed response of a search call.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    /// Per hit file: neighbors grouped by relationship label. Present
    /// only for graph-augmented searches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_files: Option<Vec<(String, ConnectionMap)>>,
    /// Tenant-wide most central files. Present only for graph-augmented
    /// searches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub central_files: Option<Vec<CentralFile>>,
}

// ---------------------------------------------------------------------------
// SearchEngine
// ---------------------------------------------------------------------------

/// Similarity search with optional graph enrichment.
pub struct SearchEngine<'a> {
    conn: &'a Connection,
    embedder: &'a EmbeddingClient,
    config: &'a EngineConfig,
}

impl<'a> SearchEngine<'a> {
    pub fn new(conn: &'a Connection, embedder: &'a EmbeddingClient, config: &'a EngineConfig) -> Self {
        Self {
            conn,
            embedder,
            config,
        }
    }

    /// Run a query against the tenant's index.
    ///
    /// The query is embedded through the same client as indexing, so both
    /// sides live in one vector space.
    pub fn search(
        &self,
        tenant: &Tenant,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        if query.trim().is_empty() {
            return Err(SceneGraphError::InvalidArgument(
                "query must not be empty".into(),
            ));
        }

        let query_vector = self.embedder.embed_one(query)?;
        let vector = VectorStore::new(self.conn);
        let results = vector.search(
            tenant,
            &query_vector,
            options.k,
            options.category,
            self.config.search.preview_chars,
        )?;
        debug!(hits = results.len(), "similarity search done");

        if !options.with_graph {
            return Ok(SearchResponse {
                results,
                connected_files: None,
                central_files: None,
            });
        }

        let store = GraphStore::new(self.conn);
        let traversal = GraphTraversal::new(&store);

        let mut connected_files = Vec::new();
        let mut seen_paths = std::collections::HashSet::new();
        for hit in &results {
            if !seen_paths.insert(hit.file_path.clone()) {
                continue;
            }
            let connections =
                traversal.connected_files(tenant, &hit.file_path, self.config.search.max_depth)?;
            connected_files.push((hit.file_path.clone(), connections));
        }

        let central_files =
            self.central_files(tenant, self.config.search.central_top_k)?;

        Ok(SearchResponse {
            results,
            connected_files: Some(connected_files),
            central_files: Some(central_files),
        })
    }

    /// Top-k files by blended centrality over the tenant's graph.
    pub fn central_files(&self, tenant: &Tenant, top_k: usize) -> Result<Vec<CentralFile>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let store = GraphStore::new(self.conn);
        let nodes = store.all_nodes(tenant)?;
        let edges = store.all_edges(tenant)?;

        let by_id: std::collections::HashMap<&str, &crate::types::GraphNode> =
            nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        let ranked = centrality::rank(&nodes, &edges, &self.config.centrality);

        let mut central = Vec::new();
        for r in ranked {
            let Some(node) = by_id.get(r.node_id.as_str()) else {
                continue;
            };
            if node.kind == NodeKind::File {
                central.push(CentralFile {
                    file_path: node.file_path.clone(),
                    score: r.score,
                });
                if central.len() == top_k {
                    break;
                }
            }
        }
        Ok(central)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::initialize_database;
    use crate::error::Result as SgResult;
    use crate::index::embedder::EmbeddingProvider;
    use crate::index::pipeline::IndexingPipeline;
    use std::sync::Arc;

    /// Embeds by byte histogram. The `File: name\n\n` framing prefix is
    /// stripped so a chunk and a query with the same text embed alike.
    struct FakeProvider;

    impl EmbeddingProvider for FakeProvider {
        fn embed(&self, texts: &[String], _model_id: &str) -> SgResult<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let body = t.split_once("\n\n").map(|(_, b)| b).unwrap_or(t.as_str());
                    let mut v = [0.0f32; 8];
                    for (i, b) in body.bytes().enumerate() {
                        v[(i + b as usize) % 8] += 1.0;
                    }
                    v.to_vec()
                })
                .collect())
        }
    }

    fn setup() -> (Connection, EmbeddingClient, EngineConfig) {
        let conn = initialize_database(":memory:").unwrap();
        let client = EmbeddingClient::new(Arc::new(FakeProvider), Default::default()).unwrap();
        (conn, client, EngineConfig::default())
    }

    fn tenant() -> Tenant {
        Tenant::new("alice", "game")
    }

    #[test]
    fn empty_query_is_rejected() {
        let (conn, client, config) = setup();
        let engine = SearchEngine::new(&conn, &client, &config);

        let result = engine.search(&tenant(), "   ", &SearchOptions::default());
        assert!(matches!(result, Err(SceneGraphError::InvalidArgument(_))));
    }

    #[test]
    fn indexed_content_is_findable() {
        let (conn, client, config) = setup();
        let pipeline = IndexingPipeline::new(&conn, &client, &config);
        let t = tenant();

        pipeline
            .index_content(&t, "doc.md", "the player jumps over obstacles\n", None)
            .unwrap();
        pipeline
            .index_content(&t, "other.md", "shader compilation pipeline details\n", None)
            .unwrap();

        let engine = SearchEngine::new(&conn, &client, &config);
        let response = engine
            .search(&t, "the player jumps over obstacles", &SearchOptions::default())
            .unwrap();

        assert!(!response.results.is_empty());
        assert_eq!(response.results[0].file_path, "doc.md");
        assert!(response.connected_files.is_none(), "graph context not requested");
    }

    #[test]
    fn with_graph_attaches_context() {
        let (conn, client, config) = setup();
        let pipeline = IndexingPipeline::new(&conn, &client, &config);
        let t = tenant();

        pipeline
            .index_content(
                &t,
                "main.tscn",
                "[gd_scene format=3]\n\n[ext_resource type=\"Script\" path=\"res://player.gd\" id=\"1\"]\n\n[node name=\"Root\" type=\"Node2D\"]\n\n[node name=\"Player\" parent=\".\"]\nscript = ExtResource(\"1\")\n",
                None,
            )
            .unwrap();
        pipeline
            .index_content(&t, "player.gd", "extends Node2D\nfunc _ready():\n\tpass\n", None)
            .unwrap();

        let engine = SearchEngine::new(&conn, &client, &config);
        let options = SearchOptions {
            with_graph: true,
            ..Default::default()
        };
        let response = engine.search(&t, "player scene root", &options).unwrap();

        let connected = response.connected_files.expect("graph context requested");
        assert!(!connected.is_empty());
        let central = response.central_files.expect("central files requested");
        assert!(!central.is_empty());
    }

    #[test]
    fn central_files_only_reports_files() {
        let (conn, client, config) = setup();
        let pipeline = IndexingPipeline::new(&conn, &client, &config);
        let t = tenant();

        pipeline
            .index_content(
                &t,
                "main.tscn",
                "[gd_scene format=3]\n\n[node name=\"Root\" type=\"Node2D\"]\n\n[node name=\"A\" parent=\".\"]\n\n[node name=\"B\" parent=\".\"]\n",
                None,
            )
            .unwrap();

        let engine = SearchEngine::new(&conn, &client, &config);
        let central = engine.central_files(&t, 10).unwrap();

        assert!(!central.is_empty());
        assert!(central.iter().all(|c| c.file_path == "main.tscn"));
    }

    #[test]
    fn referenced_script_outranks_isolated_file() {
        let (conn, client, config) = setup();
        let pipeline = IndexingPipeline::new(&conn, &client, &config);
        let t = tenant();

        pipeline
            .index_content(
                &t,
                "main.tscn",
                "[gd_scene format=3]\n\n[ext_resource type=\"Script\" path=\"res://player.gd\" id=\"1\"]\n\n[node name=\"Root\" type=\"Node2D\"]\nscript = ExtResource(\"1\")\n",
                None,
            )
            .unwrap();
        pipeline
            .index_content(&t, "player.gd", "extends Node2D\n", None)
            .unwrap();
        pipeline
            .index_content(&t, "lonely.md", "unreferenced notes\n", None)
            .unwrap();

        let engine = SearchEngine::new(&conn, &client, &config);
        let central = engine.central_files(&t, 3).unwrap();

        let pos = |path: &str| central.iter().position(|c| c.file_path == path);
        let lonely = pos("lonely.md").expect("lonely.md present");
        assert!(
            pos("player.gd").expect("player.gd present") < lonely,
            "referenced file must outrank the isolated one"
        );
    }
}
