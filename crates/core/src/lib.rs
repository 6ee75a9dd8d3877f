pub mod chunking;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod models;
pub mod parser;
pub mod stores;
pub mod traits;

pub use chunking::{
    build_course_chunks, chunk_text, normalize_whitespace, split_sentences, ChunkingConfig,
};
pub use embeddings::{
    cosine_distance, Embedder, HashedTrigramEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use engine::RetrievalEngine;
pub use error::{IngestError, SearchError};
pub use ingest::{discover_course_documents, ingest_course_folder, FailedDocument, IngestReport};
pub use models::{
    CatalogEntry, Course, CourseAnalytics, CourseChunk, Lesson, PipelineConfig, ScoredChunk,
    SearchFilter, SearchOutcome, SourceRef,
};
pub use parser::{parse_course_document, ParsedDocument};
pub use stores::{MemoryIndex, QdrantIndex};
pub use traits::{CatalogIndex, ContentIndex};
