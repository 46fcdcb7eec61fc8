//! Embedding client.
//!
//! Wraps an external text→vector capability behind [`EmbeddingProvider`]
//! and adds the operational envelope: fixed-size batching, text
//! truncation, a bound on concurrently in-flight provider calls, and
//! retry with jittered exponential backoff.
//!
//! A batch that exhausts its retries is dropped — its texts contribute no
//! embeddings and the failure is logged, so one bad batch never aborts an
//! indexing run. Callers must therefore tolerate fewer embeddings than
//! texts.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rayon::prelude::*;
use tracing::warn;

use crate::config::EmbeddingConfig;
use crate::error::{Result, SceneGraphError};

// ---------------------------------------------------------------------------
// EmbeddingProvider
// ---------------------------------------------------------------------------

/// External embedding capability: texts in, fixed-dimensionality vectors
/// out. One call corresponds to one provider request.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, texts: &[String], model_id: &str) -> Result<Vec<Vec<f32>>>;
}

// ---------------------------------------------------------------------------
// EmbeddingClient
// ---------------------------------------------------------------------------

/// Batching, throttling, retrying front-end over an [`EmbeddingProvider`].
///
/// In-flight concurrency is bounded by a private thread pool with
/// `max_concurrent_batches` threads; a pool thread is the permit.
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    config: EmbeddingConfig,
    pool: rayon::ThreadPool,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: EmbeddingConfig) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_concurrent_batches.max(1))
            .thread_name(|i| format!("embed-{i}"))
            .build()
            .map_err(|e| SceneGraphError::Embedding(format!("thread pool: {e}")))?;

        Ok(Self {
            provider,
            config,
            pool,
        })
    }

    /// The model every call goes out under.
    pub fn model_id(&self) -> &str {
        &self.config.model_id
    }

    /// Embed a list of texts.
    ///
    /// The result may be **shorter** than the input when batches fail
    /// terminally; surviving embeddings keep their relative order, so a
    /// best-effort zip against the input is only valid when the lengths
    /// match.
    pub fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        if texts.is_empty() {
            return Vec::new();
        }

        let truncated: Vec<String> = texts
            .iter()
            .map(|t| truncate_chars(t, self.config.max_text_chars).to_string())
            .collect();

        let batches: Vec<&[String]> = truncated.chunks(self.config.batch_size.max(1)).collect();

        let results: Vec<Vec<Vec<f32>>> = self.pool.install(|| {
            batches
                .par_iter()
                .map(|batch| self.embed_with_retry(batch).unwrap_or_default())
                .collect()
        });

        results.into_iter().flatten().collect()
    }

    /// Embed a single text, with the same retry policy as batches.
    ///
    /// Used for query embeddings so searches live in the same vector
    /// space as the index.
    pub fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let truncated = truncate_chars(text, self.config.max_text_chars).to_string();
        let embeddings = self.embed_with_retry(&[truncated])?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| SceneGraphError::Embedding("provider returned no embedding".into()))
    }

    /// Call the provider for one batch, retrying with exponential backoff
    /// plus random jitter. Returns `Err` only after the final attempt.
    fn embed_with_retry(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let attempts = self.config.max_attempts.max(1);

        for attempt in 0..attempts {
            match self.provider.embed(batch, &self.config.model_id) {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) => {
                    if attempt + 1 == attempts {
                        warn!(
                            batch_len = batch.len(),
                            attempts, "dropping embedding batch: {e}"
                        );
                        return Err(e);
                    }
                    let backoff = self.config.backoff_base_ms.saturating_mul(1 << attempt);
                    let jitter = if self.config.backoff_jitter_ms > 0 {
                        fastrand::u64(0..self.config.backoff_jitter_ms)
                    } else {
                        0
                    };
                    thread::sleep(Duration::from_millis(backoff + jitter));
                }
            }
        }

        unreachable!("retry loop returns on final attempt")
    }
}

/// Truncate to at most `max` characters on a char boundary.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
