//! Indexing layer — chunking, embedding, and the project pipeline.

pub mod chunker;
pub mod embedder;
pub mod pipeline;

pub use chunker::chunk;
pub use embedder::{EmbeddingClient, EmbeddingProvider};
pub use pipeline::{FileInput, FileOutcome, IndexingPipeline};
