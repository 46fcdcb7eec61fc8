//! Caller-facing engine.
//!
//! [`ProjectEngine`] owns the database connection and embedding client
//! and exposes the operations an API layer calls: file/batch/project
//! indexing, removal, search, graph queries, stats, and clear. Mandatory
//! arguments are validated up front; batch operations aggregate per-file
//! failures into stats instead of throwing.

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;

use crate::config::EngineConfig;
use crate::db::schema::initialize_database;
use crate::error::{Result, SceneGraphError};
use crate::graph::store::{GraphStats, GraphStore};
use crate::graph::traversal::{ConnectionMap, GraphTraversal};
use crate::index::embedder::{EmbeddingClient, EmbeddingProvider};
use crate::index::pipeline::{FileInput, FileOutcome, IndexingPipeline};
use crate::search::{CentralFile, SearchEngine, SearchOptions, SearchResponse};
use crate::types::{IndexStats, Tenant};
use crate::vector::{VectorStats, VectorStore};

// ---------------------------------------------------------------------------
// EngineStats
// ---------------------------------------------------------------------------

/// Combined index and graph statistics for one tenant.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineStats {
    pub files_indexed: usize,
    pub total_chunks: usize,
    pub last_indexed: Option<f64>,
    pub graph_nodes: usize,
    pub graph_edges: usize,
    pub embedding_model: String,
}

// ---------------------------------------------------------------------------
// ProjectEngine
// ---------------------------------------------------------------------------

/// The indexing and search engine for one database.
///
/// All operations are tenant-scoped; one engine instance serves any
/// number of tenants.
pub struct ProjectEngine {
    conn: Connection,
    embedder: EmbeddingClient,
    config: EngineConfig,
}

impl ProjectEngine {
    /// Open (or create) the database at `db_path`.
    pub fn new(
        db_path: &str,
        provider: Arc<dyn EmbeddingProvider>,
        config: EngineConfig,
    ) -> Result<Self> {
        let conn = initialize_database(db_path)?;
        let embedder = EmbeddingClient::new(provider, config.embedding.clone())?;
        Ok(Self {
            conn,
            embedder,
            config,
        })
    }

    /// In-memory engine, for tests and ephemeral sessions.
    pub fn in_memory(provider: Arc<dyn EmbeddingProvider>, config: EngineConfig) -> Result<Self> {
        Self::new(":memory:", provider, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -------------------------------------------------------------------
    // Indexing
    // -------------------------------------------------------------------

    /// Index one file from provided content. `hash` is trusted when
    /// given, computed otherwise.
    pub fn index_file(
        &self,
        tenant: &Tenant,
        path: &str,
        content: &str,
        hash: Option<&str>,
    ) -> Result<FileOutcome> {
        validate_tenant(tenant)?;
        require_non_empty("path", path)?;
        self.pipeline().index_content(tenant, path, content, hash)
    }

    /// Index a batch of files with provided content. Always returns
    /// stats; per-file failures are aggregated.
    pub fn index_batch(&self, tenant: &Tenant, files: &[FileInput]) -> Result<IndexStats> {
        validate_tenant(tenant)?;
        Ok(self.pipeline().index_batch(tenant, files))
    }

    /// Walk and index a project tree, sweeping records of deleted files.
    pub fn index_project(&self, tenant: &Tenant, root: &Path, force: bool) -> Result<IndexStats> {
        validate_tenant(tenant)?;
        self.pipeline().index_project(tenant, root, force)
    }

    /// Remove one file's records from the index and the graph.
    pub fn remove_file(&self, tenant: &Tenant, path: &str) -> Result<()> {
        validate_tenant(tenant)?;
        require_non_empty("path", path)?;
        self.pipeline().remove_file(tenant, path)
    }

    // -------------------------------------------------------------------
    // Search and graph queries
    // -------------------------------------------------------------------

    /// Similarity search, optionally graph-augmented.
    pub fn search(
        &self,
        tenant: &Tenant,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        validate_tenant(tenant)?;
        self.search_engine().search(tenant, query, options)
    }

    /// Files and scene nodes connected to `path` within `max_depth` hops.
    pub fn get_connections(
        &self,
        tenant: &Tenant,
        path: &str,
        max_depth: usize,
    ) -> Result<ConnectionMap> {
        validate_tenant(tenant)?;
        require_non_empty("path", path)?;
        let store = GraphStore::new(&self.conn);
        GraphTraversal::new(&store).connected_files(tenant, path, max_depth)
    }

    /// The tenant's most central files.
    pub fn get_central_files(&self, tenant: &Tenant, top_k: usize) -> Result<Vec<CentralFile>> {
        validate_tenant(tenant)?;
        self.search_engine().central_files(tenant, top_k)
    }

    // -------------------------------------------------------------------
    // Stats and lifecycle
    // -------------------------------------------------------------------

    /// Combined vector and graph statistics.
    pub fn get_stats(&self, tenant: &Tenant) -> Result<EngineStats> {
        validate_tenant(tenant)?;
        let VectorStats {
            files_indexed,
            total_chunks,
            last_indexed,
        } = VectorStore::new(&self.conn).stats(tenant)?;
        let graph = GraphStore::new(&self.conn).stats(tenant)?;
        Ok(EngineStats {
            files_indexed,
            total_chunks,
            last_indexed,
            graph_nodes: graph.nodes,
            graph_edges: graph.edges,
            embedding_model: self.embedder.model_id().to_string(),
        })
    }

    /// Kind distributions and sizes of the tenant's graph.
    pub fn graph_summary(&self, tenant: &Tenant) -> Result<GraphStats> {
        validate_tenant(tenant)?;
        GraphStore::new(&self.conn).stats(tenant)
    }

    /// Drop everything the tenant has indexed.
    pub fn clear(&self, tenant: &Tenant) -> Result<()> {
        validate_tenant(tenant)?;
        VectorStore::new(&self.conn).clear(tenant)?;
        GraphStore::new(&self.conn).clear(tenant)?;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------

    fn pipeline(&self) -> IndexingPipeline<'_> {
        IndexingPipeline::new(&self.conn, &self.embedder, &self.config)
    }

    fn search_engine(&self) -> SearchEngine<'_> {
        SearchEngine::new(&self.conn, &self.embedder, &self.config)
    }
}

fn validate_tenant(tenant: &Tenant) -> Result<()> {
    require_non_empty("user_id", &tenant.user_id)?;
    require_non_empty("project_id", &tenant.project_id)
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SceneGraphError::InvalidArgument(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
