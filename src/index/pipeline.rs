//! Indexing pipeline.
//!
//! A two-phase batch job: a single-threaded walk enumerates eligible
//! files and which paths are still present, then a bounded worker pool
//! chunks, embeds, and extracts each file concurrently. Persistence runs
//! sequentially afterwards — the SQLite connection never crosses worker
//! threads, so stored hashes are pre-fetched before the parallel phase.
//!
//! Per-file failures are aggregated into the returned stats, never
//! thrown; one bad file cannot abort a project run.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use ignore::WalkBuilder;
use rayon::prelude::*;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{Result, SceneGraphError};
use crate::graph::extractor::{self, ExtractedGraph};
use crate::graph::store::GraphStore;
use crate::index::chunker;
use crate::index::embedder::EmbeddingClient;
use crate::types::{
    content_hash, is_indexable_path, FileCategory, IndexStats, Tenant, TextChunk,
};
use crate::vector::{UpsertOutcome, VectorStore};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One file submitted for content-based indexing.
#[derive(Debug, Clone)]
pub struct FileInput {
    pub path: String,
    pub content: String,
    /// Precomputed content hash; computed from `content` when absent.
    pub hash: Option<String>,
}

/// Outcome of indexing a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Indexed,
    /// Hash gate matched; nothing written.
    Unchanged,
    /// Not eligible for indexing (category, size, or hidden path).
    Skipped,
}

/// Everything computed off-connection for one file.
struct PreparedFile {
    path: String,
    hash: String,
    category: Option<FileCategory>,
    chunks: Vec<TextChunk>,
    embeddings: Vec<Vec<f32>>,
    graph: ExtractedGraph,
}

/// Result of the parallel phase for one walked file.
enum Walked {
    Unchanged,
    Unreadable,
    Prepared(Box<PreparedFile>),
    Failed(String),
}

// ---------------------------------------------------------------------------
// IndexingPipeline
// ---------------------------------------------------------------------------

/// Chunk → embed → extract → persist, for single files and whole trees.
pub struct IndexingPipeline<'a> {
    conn: &'a Connection,
    embedder: &'a EmbeddingClient,
    config: &'a EngineConfig,
}

impl<'a> IndexingPipeline<'a> {
    pub fn new(conn: &'a Connection, embedder: &'a EmbeddingClient, config: &'a EngineConfig) -> Self {
        Self {
            conn,
            embedder,
            config,
        }
    }

    // -------------------------------------------------------------------
    // Single file
    // -------------------------------------------------------------------

    /// Index one file from provided content.
    ///
    /// # Errors
    ///
    /// Fails when the embedding count does not match the chunk count (the
    /// file is left untouched) or on storage errors.
    pub fn index_content(
        &self,
        tenant: &Tenant,
        path: &str,
        content: &str,
        hash: Option<&str>,
    ) -> Result<FileOutcome> {
        self.index_content_inner(tenant, path, content, hash, false)
    }

    fn index_content_inner(
        &self,
        tenant: &Tenant,
        path: &str,
        content: &str,
        hash: Option<&str>,
        force: bool,
    ) -> Result<FileOutcome> {
        if !is_indexable_path(path) {
            return Ok(FileOutcome::Skipped);
        }

        let file_hash = match hash {
            Some(h) => h.to_string(),
            None => content_hash(content),
        };

        let vector = VectorStore::new(self.conn);
        if force {
            vector.remove_file(tenant, path)?;
        } else if let Some(stored) = vector.stored_file_hash(tenant, path)? {
            if stored == file_hash {
                return Ok(FileOutcome::Unchanged);
            }
        }

        let prepared = prepare_file(self.embedder, self.config, tenant, path, content, file_hash)?;
        self.persist(tenant, &prepared)?;
        Ok(FileOutcome::Indexed)
    }

    /// Index a batch of files with provided content, aggregating failures.
    pub fn index_batch(&self, tenant: &Tenant, files: &[FileInput]) -> IndexStats {
        let mut stats = IndexStats {
            total: files.len(),
            ..Default::default()
        };

        for file in files {
            if file.path.is_empty() || file.content.is_empty() {
                stats.skipped += 1;
                continue;
            }
            match self.index_content(tenant, &file.path, &file.content, file.hash.as_deref()) {
                Ok(FileOutcome::Indexed) => stats.indexed += 1,
                Ok(FileOutcome::Unchanged) | Ok(FileOutcome::Skipped) => stats.skipped += 1,
                Err(e) => {
                    warn!(file = %file.path, "indexing failed: {e}");
                    stats.failed += 1;
                }
            }
        }

        stats
    }

    /// Remove a file from both the vector index and the graph.
    pub fn remove_file(&self, tenant: &Tenant, path: &str) -> Result<()> {
        VectorStore::new(self.conn).remove_file(tenant, path)?;
        GraphStore::new(self.conn).delete_file(tenant, path)?;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Project tree
    // -------------------------------------------------------------------

    /// Index an entire project tree, then garbage-collect records for
    /// files that no longer exist.
    pub fn index_project(&self, tenant: &Tenant, root: &Path, force: bool) -> Result<IndexStats> {
        // ---- Phase 1: walk (sequential) ----
        let (eligible, ineligible_count) = collect_files(root, self.config.indexing.max_file_bytes);
        let present_paths: HashSet<String> =
            eligible.iter().map(|(_, rel)| rel.clone()).collect();

        let vector = VectorStore::new(self.conn);
        let stored_hashes: HashMap<String, String> = if force {
            HashMap::new()
        } else {
            vector.stored_hashes(tenant)?
        };

        let mut stats = IndexStats {
            total: eligible.len() + ineligible_count,
            skipped: ineligible_count,
            ..Default::default()
        };

        // ---- Phase 2: chunk/embed/extract (bounded worker pool) ----
        let embedder = self.embedder;
        let config = self.config;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.indexing.effective_workers())
            .build()
            .map_err(|e| SceneGraphError::Other(format!("worker pool: {e}")))?;

        let walked: Vec<Walked> = pool.install(|| {
            eligible
                .par_iter()
                .map(|(abs, rel)| {
                    let content = match fs::read_to_string(abs) {
                        Ok(c) => c,
                        Err(_) => return Walked::Unreadable,
                    };
                    let file_hash = content_hash(&content);
                    if stored_hashes.get(rel) == Some(&file_hash) {
                        return Walked::Unchanged;
                    }
                    match prepare_file(embedder, config, tenant, rel, &content, file_hash) {
                        Ok(prepared) => Walked::Prepared(Box::new(prepared)),
                        Err(e) => Walked::Failed(format!("{rel}: {e}")),
                    }
                })
                .collect()
        });

        // ---- Phase 3: persist (sequential, single connection) ----
        for item in walked {
            match item {
                Walked::Unchanged | Walked::Unreadable => stats.skipped += 1,
                Walked::Failed(reason) => {
                    warn!("indexing failed: {reason}");
                    stats.failed += 1;
                }
                Walked::Prepared(prepared) => {
                    if force {
                        if let Err(e) = vector.remove_file(tenant, &prepared.path) {
                            warn!(file = %prepared.path, "force delete failed: {e}");
                        }
                    }
                    match self.persist(tenant, &prepared) {
                        Ok(()) => stats.indexed += 1,
                        Err(e) => {
                            warn!(file = %prepared.path, "persist failed: {e}");
                            stats.failed += 1;
                        }
                    }
                }
            }
        }

        // ---- Sweep records for files no longer on disk ----
        stats.removed = vector.sweep_missing(tenant, &present_paths)?;
        GraphStore::new(self.conn).sweep_missing(tenant, &present_paths)?;

        info!(tenant = %tenant, "project index complete: {stats}");
        Ok(stats)
    }

    // -------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------

    fn persist(&self, tenant: &Tenant, prepared: &PreparedFile) -> Result<()> {
        let vector = VectorStore::new(self.conn);
        let outcome = vector.upsert_file(
            tenant,
            &prepared.path,
            &prepared.chunks,
            &prepared.embeddings,
            &prepared.hash,
            prepared.category,
            self.config.indexing.max_stored_chars,
        )?;

        // Structural extraction replaces the file's graph contribution
        // even when the vector rows were unchanged, keeping both stores
        // in step after partial failures.
        GraphStore::new(self.conn).replace_file_graph(
            tenant,
            &prepared.path,
            &prepared.graph.nodes,
            &prepared.graph.edges,
        )?;

        if let UpsertOutcome::Indexed { chunks } = outcome {
            info!(file = %prepared.path, chunks, "indexed");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Off-connection preparation
// ---------------------------------------------------------------------------

/// Chunk, embed, and extract one file. Runs on worker threads — must not
/// touch the database.
fn prepare_file(
    embedder: &EmbeddingClient,
    config: &EngineConfig,
    tenant: &Tenant,
    path: &str,
    content: &str,
    file_hash: String,
) -> Result<PreparedFile> {
    let chunks = chunker::chunk(content, path, &config.chunking);

    let basename = path.rsplit('/').next().unwrap_or(path);
    let texts: Vec<String> = chunks
        .iter()
        .map(|c| format!("File: {basename}\n\n{}", c.content))
        .collect();
    let embeddings = embedder.embed_batch(&texts);

    // A partial batch would misalign chunk-to-embedding association;
    // fail the whole file instead of persisting a subset.
    if embeddings.len() != chunks.len() {
        return Err(SceneGraphError::Embedding(format!(
            "embedding count mismatch: {} chunks, {} embeddings",
            chunks.len(),
            embeddings.len()
        )));
    }

    let graph = extractor::extract(tenant, path, content);

    Ok(PreparedFile {
        path: path.to_string(),
        hash: file_hash,
        category: FileCategory::from_path(path),
        chunks,
        embeddings,
        graph,
    })
}

// ---------------------------------------------------------------------------
// File collection
// ---------------------------------------------------------------------------

/// Walk `root`, honoring ignore files and hidden-file filters. Returns
/// eligible (absolute, project-relative) pairs plus a count of files seen
/// but not eligible.
fn collect_files(root: &Path, max_file_bytes: u64) -> (Vec<(std::path::PathBuf, String)>, usize) {
    let walker = WalkBuilder::new(root).standard_filters(true).build();

    let mut eligible = Vec::new();
    let mut ineligible = 0usize;
    for entry in walker.flatten() {
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let path = entry.path();
        let rel = match path.strip_prefix(root) {
            Ok(r) => r.to_string_lossy().replace('\\', "/"),
            Err(_) => {
                ineligible += 1;
                continue;
            }
        };
        if !is_indexable_path(&rel) {
            ineligible += 1;
            continue;
        }
        let too_large = fs::metadata(path)
            .map(|m| m.len() > max_file_bytes)
            .unwrap_or(true);
        if too_large {
            ineligible += 1;
            continue;
        }
        eligible.push((path.to_path_buf(), rel));
    }
    (eligible, ineligible)
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
    use std::sync::Arc;

    /// Deterministic 4-dim embedding from text bytes.
    struct FakeProvider;

    impl EmbeddingProvider for FakeProvider {
        fn embed(&self, texts: &[String], _model_id: &str) -> SgResult<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = [0.0f32; 4];
                    for (i, b) in t.bytes().enumerate() {
                        v[i % 4] += f32::from(b) / 255.0;
                    }
                    v.to_vec()
                })
                .collect())
        }
    }

    fn make_client() -> EmbeddingClient {
        EmbeddingClient::new(Arc::new(FakeProvider), Default::default()).unwrap()
    }

    fn tenant() -> Tenant {
        Tenant::new("alice", "game")
    }

    fn setup_project() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("scripts")).unwrap();
        fs::write(
            tmp.path().join("main.tscn"),
            "[gd_scene format=3]\n\n[ext_resource type=\"Script\" path=\"res://scripts/player.gd\" id=\"1\"]\n\n[node name=\"Root\" type=\"Node2D\"]\n\n[node name=\"Player\" parent=\".\"]\nscript = ExtResource(\"1\")\n",
        )
        .unwrap();
        fs::write(
            tmp.path().join("scripts/player.gd"),
            "extends Node2D\n\nfunc _ready():\n\tpass\n",
        )
        .unwrap();
        fs::write(tmp.path().join("sprite.png"), [0u8, 1, 2]).unwrap();
        tmp
    }

    #[test]
    fn index_project_walks_and_persists() {
        let conn = initialize_database(":memory:").unwrap();
        let client = make_client();
        let config = EngineConfig::default();
        let pipeline = IndexingPipeline::new(&conn, &client, &config);
        let tmp = setup_project();

        let stats = pipeline.index_project(&tenant(), tmp.path(), false).unwrap();

        assert_eq!(stats.indexed, 2, "tscn and gd files indexed");
        assert!(stats.skipped >= 1, "png skipped");
        assert_eq!(stats.failed, 0);

        let vstats = VectorStore::new(&conn).stats(&tenant()).unwrap();
        assert_eq!(vstats.files_indexed, 2);

        let gstats = GraphStore::new(&conn).stats(&tenant()).unwrap();
        assert!(gstats.nodes >= 4, "file nodes + scene nodes");
        assert!(gstats.edge_kinds.contains_key("attaches_script"));
    }

    #[test]
    fn reindex_is_idempotent() {
        let conn = initialize_database(":memory:").unwrap();
        let client = make_client();
        let config = EngineConfig::default();
        let pipeline = IndexingPipeline::new(&conn, &client, &config);
        let tmp = setup_project();
        let t = tenant();

        let first = pipeline.index_project(&t, tmp.path(), false).unwrap();
        let chunks_after_first = VectorStore::new(&conn).stats(&t).unwrap().total_chunks;

        let second = pipeline.index_project(&t, tmp.path(), false).unwrap();

        assert_eq!(second.indexed, 0, "nothing changed on disk");
        assert_eq!(second.skipped, first.indexed + first.skipped);
        assert_eq!(
            VectorStore::new(&conn).stats(&t).unwrap().total_chunks,
            chunks_after_first,
            "no duplicate rows"
        );
    }

    #[test]
    fn modified_file_is_reindexed() {
        let conn = initialize_database(":memory:").unwrap();
        let client = make_client();
        let config = EngineConfig::default();
        let pipeline = IndexingPipeline::new(&conn, &client, &config);
        let tmp = setup_project();
        let t = tenant();

        pipeline.index_project(&t, tmp.path(), false).unwrap();

        fs::write(
            tmp.path().join("scripts/player.gd"),
            "extends Node2D\n\nfunc _ready():\n\tprint(\"changed\")\n",
        )
        .unwrap();

        let second = pipeline.index_project(&t, tmp.path(), false).unwrap();
        assert_eq!(second.indexed, 1, "only the modified file re-indexes");
    }

    #[test]
    fn force_reindexes_unchanged_files() {
        let conn = initialize_database(":memory:").unwrap();
        let client = make_client();
        let config = EngineConfig::default();
        let pipeline = IndexingPipeline::new(&conn, &client, &config);
        let tmp = setup_project();
        let t = tenant();

        pipeline.index_project(&t, tmp.path(), false).unwrap();
        let forced = pipeline.index_project(&t, tmp.path(), true).unwrap();

        assert_eq!(forced.indexed, 2, "force bypasses the hash gate");
    }

    #[test]
    fn deleted_file_is_swept() {
        let conn = initialize_database(":memory:").unwrap();
        let client = make_client();
        let config = EngineConfig::default();
        let pipeline = IndexingPipeline::new(&conn, &client, &config);
        let tmp = setup_project();
        let t = tenant();

        pipeline.index_project(&t, tmp.path(), false).unwrap();
        fs::remove_file(tmp.path().join("scripts/player.gd")).unwrap();

        let second = pipeline.index_project(&t, tmp.path(), false).unwrap();
        assert_eq!(second.removed, 1);

        let vstats = VectorStore::new(&conn).stats(&t).unwrap();
        assert_eq!(vstats.files_indexed, 1, "only main.tscn remains");
        assert!(GraphStore::new(&conn)
            .nodes_by_file(&t, "scripts/player.gd")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn index_batch_aggregates_outcomes() {
        let conn = initialize_database(":memory:").unwrap();
        let client = make_client();
        let config = EngineConfig::default();
        let pipeline = IndexingPipeline::new(&conn, &client, &config);
        let t = tenant();

        let files = vec![
            FileInput {
                path: "a.gd".to_string(),
                content: "extends Node\n".to_string(),
                hash: None,
            },
            FileInput {
                path: String::new(),
                content: "x".to_string(),
                hash: None,
            },
            FileInput {
                path: "art.png".to_string(),
                content: "binaryish".to_string(),
                hash: None,
            },
        ];

        let stats = pipeline.index_batch(&t, &files);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.indexed, 1);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.failed, 0);
    }

    #[test]
    fn count_mismatch_marks_file_failed() {
        /// Returns one embedding fewer than requested.
        struct ShortProvider;
        impl EmbeddingProvider for ShortProvider {
            fn embed(&self, texts: &[String], _m: &str) -> SgResult<Vec<Vec<f32>>> {
                Ok(texts.iter().skip(1).map(|_| vec![1.0, 0.0]).collect())
            }
        }

        let conn = initialize_database(":memory:").unwrap();
        let client = EmbeddingClient::new(Arc::new(ShortProvider), Default::default()).unwrap();
        let config = EngineConfig::default();
        let pipeline = IndexingPipeline::new(&conn, &client, &config);
        let t = tenant();

        let result = pipeline.index_content(&t, "a.gd", "extends Node\n", None);
        assert!(result.is_err());
        assert_eq!(
            VectorStore::new(&conn).stats(&t).unwrap().total_chunks,
            0,
            "nothing partially inserted"
        );
    }

    #[test]
    fn remove_file_clears_both_stores() {
        let conn = initialize_database(":memory:").unwrap();
        let client = make_client();
        let config = EngineConfig::default();
        let pipeline = IndexingPipeline::new(&conn, &client, &config);
        let t = tenant();

        pipeline
            .index_content(&t, "a.gd", "extends Node\n", None)
            .unwrap();
        pipeline.remove_file(&t, "a.gd").unwrap();

        assert_eq!(VectorStore::new(&conn).stats(&t).unwrap().total_chunks, 0);
        assert!(GraphStore::new(&conn)
            .nodes_by_file(&t, "a.gd")
            .unwrap()
            .is_empty());
    }
}
