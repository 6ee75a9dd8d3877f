use crate::error::SearchError;
use crate::models::{CatalogEntry, CourseChunk, ScoredChunk, SearchFilter};
use async_trait::async_trait;

/// Course-level collection: one entry per course, embedded on title text.
/// Callers supply embeddings so implementations stay model-agnostic.
#[async_trait]
pub trait CatalogIndex {
    /// Write or overwrite the entry for `entry.title`. Idempotent on title.
    async fn upsert_course(
        &self,
        entry: &CatalogEntry,
        embedding: &[f32],
    ) -> Result<(), SearchError>;

    async fn course_titles(&self) -> Result<Vec<String>, SearchError>;

    async fn course_count(&self) -> Result<usize, SearchError>;

    async fn course_entry(&self, title: &str) -> Result<Option<CatalogEntry>, SearchError>;

    /// Duplicate check used by ingestion to skip already-loaded courses.
    async fn course_exists(&self, title: &str) -> Result<bool, SearchError> {
        Ok(self.course_entry(title).await?.is_some())
    }

    /// Nearest catalog title to the query vector, with its distance.
    /// `None` only when the catalog is empty.
    async fn resolve_course(
        &self,
        query_vector: &[f32],
    ) -> Result<Option<(String, f32)>, SearchError>;

    async fn clear(&self) -> Result<(), SearchError>;
}

/// Chunk-level collection. Chunk identity is `<course_title>_<chunk_index>`,
/// so re-indexing a course overwrites its previous chunks.
#[async_trait]
pub trait ContentIndex {
    async fn index_chunks(
        &self,
        chunks: &[CourseChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError>;

    /// Up to `limit` chunks matching `filter`, ascending by distance.
    async fn search_chunks(
        &self,
        query_vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, SearchError>;

    async fn clear(&self) -> Result<(), SearchError>;
}
