//! SceneGraph — project intelligence for game workspaces.
//!
//! Indexes the text content of a project (scenes, scripts, resources,
//! config, docs) into semantically searchable chunks, and concurrently
//! extracts a typed relationship graph between files — who instantiates,
//! attaches, or references what — to enrich search results with
//! structural context and rank files by importance.
//!
//! The main entry point is [`engine::ProjectEngine`]; API layers serving
//! many tenants should hand out engines through
//! [`registry::EngineRegistry`]. Embeddings come from whatever implements
//! [`index::EmbeddingProvider`].

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod graph;
pub mod index;
pub mod observability;
pub mod registry;
pub mod search;
pub mod types;
pub mod vector;

pub use config::EngineConfig;
pub use engine::{EngineStats, ProjectEngine};
pub use error::{Result, SceneGraphError};
pub use index::{EmbeddingClient, EmbeddingProvider, FileInput, FileOutcome};
pub use registry::EngineRegistry;
pub use search::{SearchOptions, SearchResponse};
pub use types::{FileCategory, IndexStats, Tenant};
