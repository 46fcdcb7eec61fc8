//! Core domain types for SceneGraph.
//!
//! Everything stored or searched is scoped by a [`Tenant`]; graph endpoints
//! are addressed by stable hashes so edges can point at files that have not
//! been indexed yet and still converge on the same id once they are.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Tenant
// ---------------------------------------------------------------------------

/// Isolation key for all indexed data: one user working on one project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tenant {
    pub user_id: String,
    pub project_id: String,
}

impl Tenant {
    pub fn new(user_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            project_id: project_id.into(),
        }
    }
}

impl std::fmt::Display for Tenant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.user_id, self.project_id)
    }
}

// ---------------------------------------------------------------------------
// FileCategory
// ---------------------------------------------------------------------------

/// Coarse file classification driving chunking strategy and graph extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Scene,
    Resource,
    Script,
    Config,
    Doc,
    Shader,
}

impl FileCategory {
    /// Classify a path by extension. Returns `None` for files that are not
    /// indexable text.
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = extension_of(path)?;
        match ext.as_str() {
            "tscn" | "scn" => Some(Self::Scene),
            "tres" | "res" | "godot" | "import" | "gdns" | "gdnlib" | "gdextension" => {
                Some(Self::Resource)
            }
            "gd" | "cs" | "cpp" | "hpp" | "h" | "c" => Some(Self::Script),
            "cfg" | "ini" | "json" | "xml" | "yaml" | "yml" => Some(Self::Config),
            "md" | "txt" | "rst" => Some(Self::Doc),
            "shader" | "gdshader" | "glsl" => Some(Self::Shader),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scene => "scene",
            Self::Resource => "resource",
            Self::Script => "script",
            Self::Config => "config",
            Self::Doc => "doc",
            Self::Shader => "shader",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "scene" => Some(Self::Scene),
            "resource" => Some(Self::Resource),
            "script" => Some(Self::Script),
            "config" => Some(Self::Config),
            "doc" | "docs" => Some(Self::Doc),
            "shader" => Some(Self::Shader),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extensions that are always binary and never indexed.
const SKIP_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "svg", // images
    "ogg", "mp3", "wav", "opus", // audio
    "mp4", "webm", "ogv", // video
    "ttf", "otf", "woff", "woff2", // fonts
    "zip", "tar", "gz", "rar", // archives
    "exe", "dll", "so", "dylib", // binaries
    "pck", "pak", // engine packages
];

/// Path fragments that mark generated or cached trees.
const SKIP_PATH_FRAGMENTS: &[&str] = &[
    "node_modules/",
    ".godot/",
    "__pycache__/",
    "build/",
    "dist/",
];

/// Whether a project-relative path is eligible for indexing at all.
///
/// Hidden files, binary extensions, generated trees, and temp files are
/// rejected; everything else must classify into a [`FileCategory`].
pub fn is_indexable_path(path: &str) -> bool {
    let basename = path.rsplit('/').next().unwrap_or(path);
    if basename.starts_with('.') {
        return false;
    }
    if path.ends_with(".import") || path.ends_with(".tmp") {
        return false;
    }
    let normalized = path.replace('\\', "/");
    if SKIP_PATH_FRAGMENTS.iter().any(|frag| normalized.contains(frag)) {
        return false;
    }
    if let Some(ext) = extension_of(path) {
        if SKIP_EXTENSIONS.contains(&ext.as_str()) {
            return false;
        }
    }
    FileCategory::from_path(path).is_some()
}

fn extension_of(path: &str) -> Option<String> {
    let basename = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = basename.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

// ---------------------------------------------------------------------------
// TextChunk
// ---------------------------------------------------------------------------

/// A contiguous line-range slice of one file, the unit of embedding.
///
/// `start_line` and `end_line` are 1-indexed and inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub file_path: String,
    pub chunk_index: u32,
    pub content: String,
    pub start_line: u32,
    pub end_line: u32,
}

// ---------------------------------------------------------------------------
// NodeKind / EdgeKind
// ---------------------------------------------------------------------------

/// Kinds of graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// The file as a whole. Every indexed file gets exactly one.
    File,
    /// One declared node inside a scene file, keyed by its structural path.
    SceneNode,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::SceneNode => "scene_node",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "file" => Some(Self::File),
            "scene_node" => Some(Self::SceneNode),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of directed edges between graph nodes.
///
/// `ChildOf` points parent→child; every other kind points referrer→referent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    ChildOf,
    AttachesScript,
    InstantiatesScene,
    UsesResource,
    ConnectsSignal { signal: String, method: String },
    Extends,
    PreloadsResource,
    LoadsResource,
    LooksUpNode,
    ChangesScene,
}

impl EdgeKind {
    /// Stable label stored in the edges table.
    pub fn label(&self) -> String {
        match self {
            Self::ChildOf => "child_of".to_string(),
            Self::AttachesScript => "attaches_script".to_string(),
            Self::InstantiatesScene => "instantiates_scene".to_string(),
            Self::UsesResource => "uses_resource".to_string(),
            Self::ConnectsSignal { signal, method } => {
                format!("connects_signal:{signal}->{method}")
            }
            Self::Extends => "extends".to_string(),
            Self::PreloadsResource => "preloads_resource".to_string(),
            Self::LoadsResource => "loads_resource".to_string(),
            Self::LooksUpNode => "looks_up_node".to_string(),
            Self::ChangesScene => "changes_scene".to_string(),
        }
    }

    /// Parse a stored label back into an edge kind.
    pub fn from_label(label: &str) -> Option<Self> {
        if let Some(rest) = label.strip_prefix("connects_signal:") {
            let (signal, method) = rest.split_once("->")?;
            return Some(Self::ConnectsSignal {
                signal: signal.to_string(),
                method: method.to_string(),
            });
        }
        match label {
            "child_of" => Some(Self::ChildOf),
            "attaches_script" => Some(Self::AttachesScript),
            "instantiates_scene" => Some(Self::InstantiatesScene),
            "uses_resource" => Some(Self::UsesResource),
            "extends" => Some(Self::Extends),
            "preloads_resource" => Some(Self::PreloadsResource),
            "loads_resource" => Some(Self::LoadsResource),
            "looks_up_node" => Some(Self::LooksUpNode),
            "changes_scene" => Some(Self::ChangesScene),
            _ => None,
        }
    }

    /// The short relationship name used for traversal grouping labels
    /// (`uses_<relationship>` / `used_by_<relationship>`).
    pub fn relationship(&self) -> &'static str {
        match self {
            Self::ChildOf => "child_of",
            Self::AttachesScript => "attaches_script",
            Self::InstantiatesScene => "instantiates_scene",
            Self::UsesResource => "uses_resource",
            Self::ConnectsSignal { .. } => "connects_signal",
            Self::Extends => "extends",
            Self::PreloadsResource => "preloads_resource",
            Self::LoadsResource => "loads_resource",
            Self::LooksUpNode => "looks_up_node",
            Self::ChangesScene => "changes_scene",
        }
    }

    /// Fixed per-kind strength prior.
    ///
    /// The relative ordering matters for traversal labeling; the exact
    /// values are a tunable prior, not a contract.
    pub fn strength(&self) -> f64 {
        match self {
            Self::ChildOf => 1.0,
            Self::AttachesScript => 0.9,
            Self::PreloadsResource => 0.9,
            Self::InstantiatesScene => 0.8,
            Self::Extends => 0.8,
            Self::LoadsResource => 0.7,
            Self::ChangesScene => 0.7,
            Self::UsesResource => 0.6,
            Self::ConnectsSignal { .. } => 0.6,
            Self::LooksUpNode => 0.5,
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

// ---------------------------------------------------------------------------
// GraphNode / GraphEdge
// ---------------------------------------------------------------------------

/// A node in the tenant's project graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    /// Stable hash of tenant + structural address (see [`stable_node_id`]).
    pub id: String,
    pub tenant: Tenant,
    pub file_path: String,
    pub kind: NodeKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    pub updated_at: f64,
}

/// A directed relationship between two graph nodes.
///
/// Endpoints are addressed by id; a target that has not been indexed yet is
/// a legal dangling reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub tenant: Tenant,
    pub source_id: String,
    pub target_id: String,
    pub kind: EdgeKind,
    /// The file whose content declared this edge.
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    pub strength: f64,
    pub updated_at: f64,
}

// ---------------------------------------------------------------------------
// Addressing
// ---------------------------------------------------------------------------

/// Stable node id: the first 16 bytes of `sha256("{user}:{project}:{address}")`
/// as hex. Link by address, not by object — two references to the same
/// address always hash to the same id, indexed or not.
pub fn stable_node_id(tenant: &Tenant, address: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tenant.user_id.as_bytes());
    hasher.update(b":");
    hasher.update(tenant.project_id.as_bytes());
    hasher.update(b":");
    hasher.update(address.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

/// Address of a file's File node: the project-relative path itself.
pub fn file_address(file_path: &str) -> String {
    file_path.to_string()
}

/// Address of a scene node declared inside a scene file.
pub fn scene_node_address(file_path: &str, node_path: &str) -> String {
    format!("{file_path}::{node_path}")
}

/// SHA-256 hex fingerprint of file content, used for hash gating.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Seconds since the unix epoch as a float, the timestamp unit of every
/// persisted row.
pub fn now_epoch() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// IndexStats
// ---------------------------------------------------------------------------

/// Aggregate outcome of a batch indexing operation.
///
/// Batch operations always return stats rather than failing on a single
/// file; failures are aggregated, never silent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub removed: usize,
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} total: {} indexed, {} skipped, {} failed, {} removed",
            self.total, self.indexed, self.skipped, self.failed, self.removed
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
