//! Tenant-scoped vector store over SQLite.
//!
//! Chunk rows are append-style: re-indexing writes new rows rather than
//! updating in place, and the prior rows are deleted best-effort. Some
//! backing stores cannot delete rows immediately after writing them, so a
//! failed delete is logged and left for a later pass — the similarity
//! query reconciles duplicates by keeping only the most recent row per
//! (file_path, chunk_index) before ranking.

use std::collections::{HashMap, HashSet};

use rusqlite::{params, Connection};
use tracing::{debug, warn};

use crate::error::{Result, SceneGraphError};
use crate::types::{now_epoch, FileCategory, Tenant, TextChunk};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Outcome of a hash-gated upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Stored hash matched; nothing was written.
    Unchanged,
    /// Prior rows retired (best-effort) and new rows written.
    Indexed { chunks: usize },
}

/// One similarity search hit.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
    pub file_path: String,
    /// Cosine similarity in [-1, 1]; for normalized embeddings, [0, 1].
    pub similarity: f64,
    pub chunk_index: u32,
    pub start_line: u32,
    pub end_line: u32,
    pub content_preview: String,
}

/// Aggregate statistics for a tenant's chunk rows.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct VectorStats {
    pub files_indexed: usize,
    pub total_chunks: usize,
    pub last_indexed: Option<f64>,
}

// ---------------------------------------------------------------------------
// SQL constants
// ---------------------------------------------------------------------------

const SELECT_FILE_HASH_SQL: &str = "\
SELECT file_hash FROM chunks
WHERE user_id = ?1 AND project_id = ?2 AND file_path = ?3
ORDER BY indexed_at DESC, id DESC
LIMIT 1";

const INSERT_CHUNK_SQL: &str = "\
INSERT INTO chunks (user_id, project_id, file_path, chunk_index, content,
                    start_line, end_line, category, file_hash, indexed_at, embedding)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

const DELETE_FILE_SQL: &str = "\
DELETE FROM chunks WHERE user_id = ?1 AND project_id = ?2 AND file_path = ?3";

const DISTINCT_PATHS_SQL: &str = "\
SELECT DISTINCT file_path FROM chunks WHERE user_id = ?1 AND project_id = ?2";

const SELECT_CANDIDATES_SQL: &str = "\
SELECT id, file_path, chunk_index, content, start_line, end_line, indexed_at, embedding
FROM chunks
WHERE user_id = ?1 AND project_id = ?2";

const SELECT_CANDIDATES_BY_CATEGORY_SQL: &str = "\
SELECT id, file_path, chunk_index, content, start_line, end_line, indexed_at, embedding
FROM chunks
WHERE user_id = ?1 AND project_id = ?2 AND category = ?3";

const STATS_SQL: &str = "\
SELECT COUNT(DISTINCT file_path), COUNT(*), MAX(indexed_at)
FROM chunks
WHERE user_id = ?1 AND project_id = ?2";

const CLEAR_SQL: &str = "\
DELETE FROM chunks WHERE user_id = ?1 AND project_id = ?2";

// ---------------------------------------------------------------------------
// VectorStore
// ---------------------------------------------------------------------------

/// Tenant-scoped chunk/embedding persistence and similarity search.
pub struct VectorStore<'a> {
    conn: &'a Connection,
}

impl<'a> VectorStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // -------------------------------------------------------------------
    // Hash gate
    // -------------------------------------------------------------------

    /// The file hash of the most recently indexed rows for a file, if any.
    pub fn stored_file_hash(&self, tenant: &Tenant, file_path: &str) -> Result<Option<String>> {
        let mut stmt = self.conn.prepare_cached(SELECT_FILE_HASH_SQL)?;
        let mut rows = stmt.query(params![tenant.user_id, tenant.project_id, file_path])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// All stored file hashes for the tenant, latest row per path.
    ///
    /// Loaded once before the parallel indexing phase so worker threads
    /// never touch the connection.
    pub fn stored_hashes(&self, tenant: &Tenant) -> Result<HashMap<String, String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT file_path, file_hash, indexed_at, id FROM chunks
             WHERE user_id = ?1 AND project_id = ?2",
        )?;
        let rows = stmt.query_map(params![tenant.user_id, tenant.project_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut latest: HashMap<String, (String, f64, i64)> = HashMap::new();
        for row in rows.flatten() {
            let (path, hash, indexed_at, row_id) = row;
            let newer = latest
                .get(&path)
                .map_or(true, |(_, ts, id)| (indexed_at, row_id) > (*ts, *id));
            if newer {
                latest.insert(path, (hash, indexed_at, row_id));
            }
        }
        Ok(latest
            .into_iter()
            .map(|(path, (hash, _, _))| (path, hash))
            .collect())
    }

    // -------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------

    /// Hash-gated replacement of a file's chunk rows.
    ///
    /// If the stored hash equals `file_hash` this is a no-op. Otherwise
    /// prior rows are deleted best-effort and the new rows inserted in one
    /// transaction, all tagged with `file_hash` and the current timestamp.
    ///
    /// # Errors
    ///
    /// Fails without writing anything when `embeddings` and `chunks`
    /// disagree in length — a partial zip would persist misaligned rows.
    pub fn upsert_file(
        &self,
        tenant: &Tenant,
        file_path: &str,
        chunks: &[TextChunk],
        embeddings: &[Vec<f32>],
        file_hash: &str,
        category: Option<FileCategory>,
        max_stored_chars: usize,
    ) -> Result<UpsertOutcome> {
        if chunks.len() != embeddings.len() {
            return Err(SceneGraphError::Embedding(format!(
                "{file_path}: {} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        if let Some(stored) = self.stored_file_hash(tenant, file_path)? {
            if stored == file_hash {
                debug!(file = file_path, "unchanged, skipping");
                return Ok(UpsertOutcome::Unchanged);
            }
        }

        // Retire prior rows. A backend that is still buffering the previous
        // write may refuse; the search-side dedup window makes the stale
        // rows harmless until a later delete succeeds.
        self.delete_file_best_effort(tenant, file_path);

        let indexed_at = now_epoch();
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(INSERT_CHUNK_SQL)?;
            for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
                let content = truncate_chars(&chunk.content, max_stored_chars);
                stmt.execute(params![
                    tenant.user_id,
                    tenant.project_id,
                    file_path,
                    chunk.chunk_index,
                    content,
                    chunk.start_line,
                    chunk.end_line,
                    category.map(|c| c.as_str()),
                    file_hash,
                    indexed_at,
                    encode_embedding(embedding),
                ])?;
            }
        }
        tx.commit()?;

        Ok(UpsertOutcome::Indexed {
            chunks: chunks.len(),
        })
    }

    /// Delete all rows for a file. Returns the number of rows removed.
    pub fn remove_file(&self, tenant: &Tenant, file_path: &str) -> Result<usize> {
        let mut stmt = self.conn.prepare_cached(DELETE_FILE_SQL)?;
        let removed = stmt.execute(params![tenant.user_id, tenant.project_id, file_path])?;
        Ok(removed)
    }

    /// Garbage-collect rows for files missing from `present_paths`.
    ///
    /// Returns the number of distinct file paths removed. Individual
    /// delete failures are logged and skipped, not fatal.
    pub fn sweep_missing(&self, tenant: &Tenant, present_paths: &HashSet<String>) -> Result<usize> {
        let indexed: Vec<String> = {
            let mut stmt = self.conn.prepare_cached(DISTINCT_PATHS_SQL)?;
            let rows = stmt.query_map(params![tenant.user_id, tenant.project_id], |row| {
                row.get::<_, String>(0)
            })?;
            rows.filter_map(|r| r.ok()).collect()
        };

        let mut removed = 0usize;
        for path in indexed {
            if !present_paths.contains(&path) {
                match self.remove_file(tenant, &path) {
                    Ok(_) => removed += 1,
                    Err(e) => warn!(file = %path, "sweep delete failed, will retry later: {e}"),
                }
            }
        }
        Ok(removed)
    }

    /// Drop every chunk row for the tenant.
    pub fn clear(&self, tenant: &Tenant) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(CLEAR_SQL)?;
        stmt.execute(params![tenant.user_id, tenant.project_id])?;
        Ok(())
    }

    fn delete_file_best_effort(&self, tenant: &Tenant, file_path: &str) {
        if let Err(e) = self.remove_file(tenant, file_path) {
            warn!(
                file = file_path,
                "delete of prior rows failed, relying on dedup window: {e}"
            );
        }
    }

    // -------------------------------------------------------------------
    // Similarity search
    // -------------------------------------------------------------------

    /// Top-k rows by cosine similarity against `query_vector`.
    ///
    /// Duplicates of a logical chunk (same file_path + chunk_index) are
    /// collapsed to the most recent row before ranking: partition by key,
    /// order by indexed_at (row id as tie-break), keep the first.
    pub fn search(
        &self,
        tenant: &Tenant,
        query_vector: &[f32],
        k: usize,
        category: Option<FileCategory>,
        preview_chars: usize,
    ) -> Result<Vec<SearchHit>> {
        let candidates: Vec<Candidate> = match category {
            Some(cat) => {
                let mut stmt = self.conn.prepare_cached(SELECT_CANDIDATES_BY_CATEGORY_SQL)?;
                let rows = stmt.query_map(
                    params![tenant.user_id, tenant.project_id, cat.as_str()],
                    row_to_candidate,
                )?;
                rows.filter_map(|r| r.ok()).collect()
            }
            None => {
                let mut stmt = self.conn.prepare_cached(SELECT_CANDIDATES_SQL)?;
                let rows =
                    stmt.query_map(params![tenant.user_id, tenant.project_id], row_to_candidate)?;
                rows.filter_map(|r| r.ok()).collect()
            }
        };

        // Latest row wins per logical chunk.
        let mut latest: HashMap<(String, u32), Candidate> = HashMap::new();
        for cand in candidates {
            let key = (cand.file_path.clone(), cand.chunk_index);
            let newer = latest.get(&key).map_or(true, |existing| {
                (cand.indexed_at, cand.row_id) > (existing.indexed_at, existing.row_id)
            });
            if newer {
                latest.insert(key, cand);
            }
        }

        let mut hits: Vec<SearchHit> = latest
            .into_values()
            .filter(|c| !c.embedding.is_empty())
            .map(|c| SearchHit {
                similarity: cosine_similarity(query_vector, &c.embedding),
                file_path: c.file_path,
                chunk_index: c.chunk_index,
                start_line: c.start_line,
                end_line: c.end_line,
                content_preview: preview(&c.content, preview_chars),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.file_path.cmp(&b.file_path))
                .then_with(|| a.chunk_index.cmp(&b.chunk_index))
        });
        hits.truncate(k);
        Ok(hits)
    }

    // -------------------------------------------------------------------
    // Stats
    // -------------------------------------------------------------------

    pub fn stats(&self, tenant: &Tenant) -> Result<VectorStats> {
        let mut stmt = self.conn.prepare_cached(STATS_SQL)?;
        let (files, chunks, last): (i64, i64, Option<f64>) = stmt.query_row(
            params![tenant.user_id, tenant.project_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok(VectorStats {
            files_indexed: files as usize,
            total_chunks: chunks as usize,
            last_indexed: last,
        })
    }
}

// ---------------------------------------------------------------------------
// Candidate rows
// ---------------------------------------------------------------------------

/// One chunk row pulled for similarity ranking.
struct Candidate {
    row_id: i64,
    file_path: String,
    chunk_index: u32,
    content: String,
    start_line: u32,
    end_line: u32,
    indexed_at: f64,
    embedding: Vec<f32>,
}

fn row_to_candidate(row: &rusqlite::Row<'_>) -> rusqlite::Result<Candidate> {
    Ok(Candidate {
        row_id: row.get(0)?,
        file_path: row.get(1)?,
        chunk_index: row.get(2)?,
        content: row.get(3)?,
        start_line: row.get(4)?,
        end_line: row.get(5)?,
        indexed_at: row.get(6)?,
        embedding: decode_embedding(&row.get::<_, Vec<u8>>(7)?),
    })
}

// ---------------------------------------------------------------------------
// Embedding codec and similarity
// ---------------------------------------------------------------------------

/// f32 little-endian byte packing for the embedding BLOB column.
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity, 0.0 when either vector has zero norm or lengths
/// differ (a dimensionality mismatch means a different model wrote the
/// row).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

fn preview(content: &str, max_chars: usize) -> String {
    if content.chars().count() > max_chars {
        let cut = truncate_chars(content, max_chars);
        format!("{cut}...")
    } else {
        content.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::initialize_database;

    fn setup() -> Connection {
        initialize_database(":memory:").expect("schema init should succeed on :memory:")
    }

    fn tenant() -> Tenant {
        Tenant::new("alice", "game")
    }

    fn make_chunks(path: &str, n: usize) -> Vec<TextChunk> {
        (0..n)
            .map(|i| TextChunk {
                file_path: path.to_string(),
                chunk_index: i as u32,
                content: format!("chunk {i} of {path}"),
                start_line: (i * 10 + 1) as u32,
                end_line: (i * 10 + 10) as u32,
            })
            .collect()
    }

    fn unit_vec(direction: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; 4];
        v[direction % 4] = 1.0;
        v
    }

    #[test]
    fn upsert_then_search_round_trip() {
        let conn = setup();
        let store = VectorStore::new(&conn);
        let t = tenant();

        let chunks = make_chunks("a.gd", 2);
        let embeddings = vec![unit_vec(0), unit_vec(1)];
        let outcome = store
            .upsert_file(&t, "a.gd", &chunks, &embeddings, "hash1", Some(FileCategory::Script), 10_000)
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Indexed { chunks: 2 });

        let hits = store.search(&t, &unit_vec(0), 5, None, 200).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_index, 0, "exact-direction chunk ranks first");
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
        assert!(hits[1].similarity < 0.5);
    }

    #[test]
    fn unchanged_hash_is_noop() {
        let conn = setup();
        let store = VectorStore::new(&conn);
        let t = tenant();

        let chunks = make_chunks("a.gd", 2);
        let embeddings = vec![unit_vec(0), unit_vec(1)];
        store
            .upsert_file(&t, "a.gd", &chunks, &embeddings, "hash1", None, 10_000)
            .unwrap();
        let second = store
            .upsert_file(&t, "a.gd", &chunks, &embeddings, "hash1", None, 10_000)
            .unwrap();

        assert_eq!(second, UpsertOutcome::Unchanged);
        assert_eq!(store.stats(&t).unwrap().total_chunks, 2, "no duplicate rows");
    }

    #[test]
    fn changed_hash_replaces_all_rows() {
        let conn = setup();
        let store = VectorStore::new(&conn);
        let t = tenant();

        store
            .upsert_file(&t, "a.gd", &make_chunks("a.gd", 3), &vec![unit_vec(0); 3], "hash1", None, 10_000)
            .unwrap();
        store
            .upsert_file(&t, "a.gd", &make_chunks("a.gd", 1), &vec![unit_vec(1); 1], "hash2", None, 10_000)
            .unwrap();

        let stats = store.stats(&t).unwrap();
        assert_eq!(stats.total_chunks, 1, "old chunks retired");
        assert_eq!(store.stored_file_hash(&t, "a.gd").unwrap().as_deref(), Some("hash2"));
    }

    #[test]
    fn count_mismatch_is_rejected_without_writing() {
        let conn = setup();
        let store = VectorStore::new(&conn);
        let t = tenant();

        let result = store.upsert_file(
            &t,
            "a.gd",
            &make_chunks("a.gd", 3),
            &[unit_vec(0)],
            "hash1",
            None,
            10_000,
        );
        assert!(result.is_err());
        assert_eq!(store.stats(&t).unwrap().total_chunks, 0);
    }

    #[test]
    fn search_dedups_to_latest_row() {
        let conn = setup();
        let store = VectorStore::new(&conn);
        let t = tenant();

        // Simulate a failed delete: insert two generations of the same
        // logical chunk directly.
        for (hash, ts, dir) in [("old", 1.0f64, 1usize), ("new", 2.0f64, 0usize)] {
            conn.execute(
                INSERT_CHUNK_SQL,
                params![
                    t.user_id,
                    t.project_id,
                    "a.gd",
                    0u32,
                    format!("gen-{hash}"),
                    1u32,
                    10u32,
                    Option::<&str>::None,
                    hash,
                    ts,
                    encode_embedding(&unit_vec(dir)),
                ],
            )
            .unwrap();
        }

        let hits = store.search(&t, &unit_vec(0), 5, None, 200).unwrap();
        assert_eq!(hits.len(), 1, "duplicates collapse to one logical chunk");
        assert!(hits[0].content_preview.contains("gen-new"));
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn search_is_tenant_scoped() {
        let conn = setup();
        let store = VectorStore::new(&conn);
        let alice = Tenant::new("alice", "game");
        let bob = Tenant::new("bob", "game");

        store
            .upsert_file(&alice, "a.gd", &make_chunks("a.gd", 1), &[unit_vec(0)], "h", None, 10_000)
            .unwrap();

        assert_eq!(store.search(&bob, &unit_vec(0), 5, None, 200).unwrap().len(), 0);
        assert_eq!(store.search(&alice, &unit_vec(0), 5, None, 200).unwrap().len(), 1);
    }

    #[test]
    fn category_filter_restricts_hits() {
        let conn = setup();
        let store = VectorStore::new(&conn);
        let t = tenant();

        store
            .upsert_file(&t, "a.gd", &make_chunks("a.gd", 1), &[unit_vec(0)], "h1", Some(FileCategory::Script), 10_000)
            .unwrap();
        store
            .upsert_file(&t, "m.tscn", &make_chunks("m.tscn", 1), &[unit_vec(0)], "h2", Some(FileCategory::Scene), 10_000)
            .unwrap();

        let scenes = store
            .search(&t, &unit_vec(0), 5, Some(FileCategory::Scene), 200)
            .unwrap();
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].file_path, "m.tscn");
    }

    #[test]
    fn remove_file_deletes_only_that_file() {
        let conn = setup();
        let store = VectorStore::new(&conn);
        let t = tenant();

        store
            .upsert_file(&t, "a.gd", &make_chunks("a.gd", 2), &vec![unit_vec(0); 2], "h1", None, 10_000)
            .unwrap();
        store
            .upsert_file(&t, "b.gd", &make_chunks("b.gd", 1), &[unit_vec(1)], "h2", None, 10_000)
            .unwrap();

        let removed = store.remove_file(&t, "a.gd").unwrap();
        assert_eq!(removed, 2);

        let hits = store.search(&t, &unit_vec(0), 10, None, 200).unwrap();
        assert!(hits.iter().all(|h| h.file_path == "b.gd"));
    }

    #[test]
    fn sweep_missing_removes_only_absent_paths() {
        let conn = setup();
        let store = VectorStore::new(&conn);
        let t = tenant();

        for path in ["a.gd", "b.gd", "c.gd"] {
            store
                .upsert_file(&t, path, &make_chunks(path, 1), &[unit_vec(0)], "h", None, 10_000)
                .unwrap();
        }

        let present: HashSet<String> = ["a.gd".to_string()].into_iter().collect();
        let removed = store.sweep_missing(&t, &present).unwrap();
        assert_eq!(removed, 2);

        let stats = store.stats(&t).unwrap();
        assert_eq!(stats.files_indexed, 1);
    }

    #[test]
    fn stats_reports_counts_and_recency() {
        let conn = setup();
        let store = VectorStore::new(&conn);
        let t = tenant();

        assert_eq!(
            store.stats(&t).unwrap(),
            VectorStats {
                files_indexed: 0,
                total_chunks: 0,
                last_indexed: None
            }
        );

        store
            .upsert_file(&t, "a.gd", &make_chunks("a.gd", 2), &vec![unit_vec(0); 2], "h", None, 10_000)
            .unwrap();

        let stats = store.stats(&t).unwrap();
        assert_eq!(stats.files_indexed, 1);
        assert_eq!(stats.total_chunks, 2);
        assert!(stats.last_indexed.is_some());
    }

    #[test]
    fn clear_wipes_tenant_only() {
        let conn = setup();
        let store = VectorStore::new(&conn);
        let alice = Tenant::new("alice", "game");
        let bob = Tenant::new("bob", "game");

        store
            .upsert_file(&alice, "a.gd", &make_chunks("a.gd", 1), &[unit_vec(0)], "h", None, 10_000)
            .unwrap();
        store
            .upsert_file(&bob, "a.gd", &make_chunks("a.gd", 1), &[unit_vec(0)], "h", None, 10_000)
            .unwrap();

        store.clear(&alice).unwrap();
        assert_eq!(store.stats(&alice).unwrap().total_chunks, 0);
        assert_eq!(store.stats(&bob).unwrap().total_chunks, 1);
    }

    #[test]
    fn embedding_codec_round_trip() {
        let original = vec![0.5f32, -1.25, 3.0, 0.0];
        let decoded = decode_embedding(&encode_embedding(&original));
        assert_eq!(original, decoded);
    }

    #[test]
    fn cosine_similarity_edge_cases() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0, "length mismatch");
    }

    #[test]
    fn preview_truncates_with_ellipsis() {
        assert_eq!(preview("short", 200), "short");
        let long = "x".repeat(250);
        let p = preview(&long, 200);
        assert_eq!(p.chars().count(), 203);
        assert!(p.ends_with("..."));
    }
}
