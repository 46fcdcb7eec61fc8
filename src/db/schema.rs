//! SQLite schema for SceneGraph.
//!
//! Three tables, all tenant-keyed:
//!
//! - `chunks` — append-only embedding rows. There is deliberately no
//!   uniqueness on the logical key (tenant, file_path, chunk_index);
//!   at-least-once writes are reconciled at query time by a
//!   latest-row-wins window in the vector store.
//! - `nodes` — graph nodes keyed by their stable address hash.
//! - `edges` — directed edges, unique per (tenant, source, target, kind).

use rusqlite::Connection;

// ---------------------------------------------------------------------------
// DDL constants — kept as separate strings so each statement can be executed
// individually and errors point at the failing statement.
// ---------------------------------------------------------------------------

const CREATE_CHUNKS: &str = "\
CREATE TABLE IF NOT EXISTS chunks (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id TEXT NOT NULL,
  project_id TEXT NOT NULL,
  file_path TEXT NOT NULL,
  chunk_index INTEGER NOT NULL,
  content TEXT NOT NULL,
  start_line INTEGER NOT NULL,
  end_line INTEGER NOT NULL,
  category TEXT,
  file_hash TEXT NOT NULL,
  indexed_at REAL NOT NULL,
  embedding BLOB NOT NULL
)";

const CREATE_NODES: &str = "\
CREATE TABLE IF NOT EXISTS nodes (
  id TEXT PRIMARY KEY,
  user_id TEXT NOT NULL,
  project_id TEXT NOT NULL,
  file_path TEXT NOT NULL,
  kind TEXT NOT NULL,
  name TEXT NOT NULL,
  node_type TEXT,
  node_path TEXT,
  start_line INTEGER,
  end_line INTEGER,
  updated_at REAL NOT NULL
)";

const CREATE_EDGES: &str = "\
CREATE TABLE IF NOT EXISTS edges (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id TEXT NOT NULL,
  project_id TEXT NOT NULL,
  source_id TEXT NOT NULL,
  target_id TEXT NOT NULL,
  kind TEXT NOT NULL,
  file_path TEXT NOT NULL,
  start_line INTEGER,
  end_line INTEGER,
  strength REAL NOT NULL DEFAULT 1.0,
  updated_at REAL NOT NULL,
  UNIQUE(user_id, project_id, source_id, target_id, kind)
)";

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_chunks_tenant ON chunks(user_id, project_id)",
    "CREATE INDEX IF NOT EXISTS idx_chunks_tenant_file ON chunks(user_id, project_id, file_path)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_tenant ON nodes(user_id, project_id)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_tenant_file ON nodes(user_id, project_id, file_path)",
    "CREATE INDEX IF NOT EXISTS idx_edges_tenant ON edges(user_id, project_id)",
    "CREATE INDEX IF NOT EXISTS idx_edges_tenant_file ON edges(user_id, project_id, file_path)",
    "CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id)",
    "CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id)",
];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Open (or create) the SQLite database at `db_path` and apply the full
/// schema.
///
/// The returned connection has WAL mode, synchronous NORMAL, and foreign
/// keys OFF — edge endpoints are addresses, not rows, so dangling targets
/// must be representable.
///
/// # Errors
///
/// Returns a `rusqlite::Error` if the database cannot be opened or any DDL
/// statement fails.
pub fn initialize_database(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "OFF")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    conn.execute_batch(CREATE_CHUNKS)?;
    conn.execute_batch(CREATE_NODES)?;
    conn.execute_batch(CREATE_EDGES)?;

    for ddl in CREATE_INDEXES {
        conn.execute_batch(ddl)?;
    }

    Ok(conn)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
