//! Engine configuration.
//!
//! Every knob has a serde default so partial configs deserialize cleanly;
//! `EngineConfig::default()` is the documented production shape.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Root configuration for a [`crate::engine::ProjectEngine`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub centrality: CentralityConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

// ---------------------------------------------------------------------------
// ChunkingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Upper bound on lines per chunk; also the window size of the
    /// fallback strategy.
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    /// Overlap between consecutive windows in the fallback strategy.
    #[serde(default = "default_window_overlap")]
    pub window_overlap: usize,
    /// A definition-boundary chunk only closes once it has more than this
    /// many lines.
    #[serde(default = "default_min_definition_lines")]
    pub min_definition_lines: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_lines: default_max_lines(),
            window_overlap: default_window_overlap(),
            min_definition_lines: default_min_definition_lines(),
        }
    }
}

fn default_max_lines() -> usize {
    50
}
fn default_window_overlap() -> usize {
    10
}
fn default_min_definition_lines() -> usize {
    5
}

// ---------------------------------------------------------------------------
// EmbeddingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model identifier passed through to the provider. The dimensionality
    /// persisted for a tenant must match this model's output.
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Texts per provider call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Texts longer than this are truncated before sending (provider limit).
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
    /// Upper bound on concurrently in-flight provider calls.
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,
    /// Attempts per batch before the batch is dropped.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Base of the exponential backoff between attempts, in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Upper bound of the random jitter added to each backoff, in
    /// milliseconds.
    #[serde(default = "default_backoff_jitter_ms")]
    pub backoff_jitter_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            batch_size: default_batch_size(),
            max_text_chars: default_max_text_chars(),
            max_concurrent_batches: default_max_concurrent_batches(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_jitter_ms: default_backoff_jitter_ms(),
        }
    }
}

fn default_model_id() -> String {
    "text-embedding-3-small".to_string()
}
fn default_batch_size() -> usize {
    20
}
fn default_max_text_chars() -> usize {
    8_000
}
fn default_max_concurrent_batches() -> usize {
    4
}
fn default_max_attempts() -> usize {
    3
}
fn default_backoff_base_ms() -> u64 {
    200
}
fn default_backoff_jitter_ms() -> u64 {
    150
}

// ---------------------------------------------------------------------------
// IndexingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Files larger than this are skipped entirely.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// Worker threads for the per-file indexing phase. `0` means
    /// 2× available parallelism.
    #[serde(default)]
    pub workers: usize,
    /// Stored chunk content is capped at this many characters.
    #[serde(default = "default_max_stored_chars")]
    pub max_stored_chars: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            workers: 0,
            max_stored_chars: default_max_stored_chars(),
        }
    }
}

fn default_max_file_bytes() -> u64 {
    10 * 1024 * 1024
}
fn default_max_stored_chars() -> usize {
    10_000
}

impl IndexingConfig {
    /// Resolve the worker count, applying the 2× parallelism default.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        parallelism * 2
    }
}

// ---------------------------------------------------------------------------
// CentralityConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentralityConfig {
    /// Blend weight of degree centrality.
    #[serde(default = "default_degree_weight")]
    pub degree_weight: f64,
    /// Blend weight of betweenness centrality.
    #[serde(default = "default_betweenness_weight")]
    pub betweenness_weight: f64,
    /// Blend weight of the PageRank measure.
    #[serde(default = "default_pagerank_weight")]
    pub pagerank_weight: f64,
    #[serde(default = "default_pagerank_damping")]
    pub pagerank_damping: f64,
    #[serde(default = "default_pagerank_iterations")]
    pub pagerank_iterations: usize,
}

impl Default for CentralityConfig {
    fn default() -> Self {
        Self {
            degree_weight: default_degree_weight(),
            betweenness_weight: default_betweenness_weight(),
            pagerank_weight: default_pagerank_weight(),
            pagerank_damping: default_pagerank_damping(),
            pagerank_iterations: default_pagerank_iterations(),
        }
    }
}

fn default_degree_weight() -> f64 {
    0.4
}
fn default_betweenness_weight() -> f64 {
    0.3
}
fn default_pagerank_weight() -> f64 {
    0.3
}
fn default_pagerank_damping() -> f64 {
    0.85
}
fn default_pagerank_iterations() -> usize {
    100
}

// ---------------------------------------------------------------------------
// SearchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default hop limit for graph-context traversal.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// How many central files accompany a graph-augmented search.
    #[serde(default = "default_central_top_k")]
    pub central_top_k: usize,
    /// Search hit previews are truncated to this many characters.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            central_top_k: default_central_top_k(),
            preview_chars: default_preview_chars(),
        }
    }
}

fn default_max_depth() -> usize {
    2
}
fn default_central_top_k() -> usize {
    10
}
fn default_preview_chars() -> usize {
    200
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
