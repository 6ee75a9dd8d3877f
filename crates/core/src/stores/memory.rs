use crate::embeddings::cosine_distance;
use crate::error::SearchError;
use crate::models::{CatalogEntry, CourseChunk, ScoredChunk, SearchFilter};
use crate::traits::{CatalogIndex, ContentIndex};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct MemoryInner {
    catalog: HashMap<String, (CatalogEntry, Vec<f32>)>,
    content: HashMap<String, (CourseChunk, Vec<f32>)>,
}

/// Embedded, process-local index over both collections. Brute-force cosine
/// scoring; fine for a bounded corpus and for tests. Keyed by the same
/// identity strings the remote backend hashes, so write semantics match.
#[derive(Default)]
pub struct MemoryIndex {
    inner: RwLock<MemoryInner>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk_count(&self) -> usize {
        self.inner
            .read()
            .map(|inner| inner.content.len())
            .unwrap_or(0)
    }
}

fn lock_poisoned() -> SearchError {
    SearchError::Request("memory index lock poisoned".to_string())
}

#[async_trait]
impl CatalogIndex for MemoryIndex {
    async fn upsert_course(
        &self,
        entry: &CatalogEntry,
        embedding: &[f32],
    ) -> Result<(), SearchError> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        inner
            .catalog
            .insert(entry.title.clone(), (entry.clone(), embedding.to_vec()));
        Ok(())
    }

    async fn course_titles(&self) -> Result<Vec<String>, SearchError> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        let mut titles: Vec<String> = inner.catalog.keys().cloned().collect();
        titles.sort();
        Ok(titles)
    }

    async fn course_count(&self) -> Result<usize, SearchError> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(inner.catalog.len())
    }

    async fn course_entry(&self, title: &str) -> Result<Option<CatalogEntry>, SearchError> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(inner.catalog.get(title).map(|(entry, _)| entry.clone()))
    }

    async fn resolve_course(
        &self,
        query_vector: &[f32],
    ) -> Result<Option<(String, f32)>, SearchError> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(inner
            .catalog
            .values()
            .map(|(entry, embedding)| {
                (entry.title.clone(), cosine_distance(query_vector, embedding))
            })
            .min_by(|left, right| left.1.total_cmp(&right.1)))
    }

    async fn clear(&self) -> Result<(), SearchError> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        inner.catalog.clear();
        Ok(())
    }
}

#[async_trait]
impl ContentIndex for MemoryIndex {
    async fn index_chunks(
        &self,
        chunks: &[CourseChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError> {
        if chunks.len() != embeddings.len() {
            return Err(SearchError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            inner
                .content
                .insert(chunk.identity(), (chunk.clone(), embedding.clone()));
        }
        Ok(())
    }

    async fn search_chunks(
        &self,
        query_vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, SearchError> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;

        let mut hits: Vec<ScoredChunk> = inner
            .content
            .values()
            .filter(|(chunk, _)| filter.matches(chunk))
            .map(|(chunk, embedding)| ScoredChunk {
                content: chunk.content.clone(),
                course_title: chunk.course_title.clone(),
                lesson_number: chunk.lesson_number,
                chunk_index: chunk.chunk_index,
                distance: cosine_distance(query_vector, embedding),
            })
            .collect();

        hits.sort_by(|left, right| left.distance.total_cmp(&right.distance));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn clear(&self) -> Result<(), SearchError> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        inner.content.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{Embedder, HashedTrigramEmbedder};
    use crate::models::{Course, Lesson};

    fn entry(title: &str) -> CatalogEntry {
        CatalogEntry::from_course(&Course {
            title: title.to_string(),
            course_link: None,
            instructor: None,
            lessons: vec![Lesson {
                number: 0,
                title: "Intro".to_string(),
                link: None,
            }],
        })
        .unwrap()
    }

    fn chunk(title: &str, lesson: Option<u32>, index: u64, content: &str) -> CourseChunk {
        CourseChunk {
            content: content.to_string(),
            course_title: title.to_string(),
            lesson_number: lesson,
            chunk_index: index,
        }
    }

    #[tokio::test]
    async fn upsert_course_is_idempotent_on_title() {
        let index = MemoryIndex::new();
        let embedder = HashedTrigramEmbedder::default();
        let embedding = embedder.embed("Course A");

        index.upsert_course(&entry("Course A"), &embedding).await.unwrap();
        index.upsert_course(&entry("Course A"), &embedding).await.unwrap();

        assert_eq!(index.course_count().await.unwrap(), 1);
        assert_eq!(index.course_titles().await.unwrap(), vec!["Course A"]);
    }

    #[tokio::test]
    async fn reindexing_chunks_does_not_duplicate() {
        let index = MemoryIndex::new();
        let embedder = HashedTrigramEmbedder::default();
        let chunks = vec![
            chunk("Course A", Some(0), 0, "first chunk text"),
            chunk("Course A", Some(1), 1, "second chunk text"),
        ];
        let embeddings: Vec<Vec<f32>> =
            chunks.iter().map(|c| embedder.embed(&c.content)).collect();

        index.index_chunks(&chunks, &embeddings).await.unwrap();
        index.index_chunks(&chunks, &embeddings).await.unwrap();

        assert_eq!(index.chunk_count(), 2);
    }

    #[tokio::test]
    async fn search_respects_filters_and_limit() {
        let index = MemoryIndex::new();
        let embedder = HashedTrigramEmbedder::default();
        let chunks = vec![
            chunk("Course A", Some(0), 0, "machine learning introduction"),
            chunk("Course A", Some(1), 1, "machine learning advanced topics"),
            chunk("Course B", Some(0), 0, "completely different subject"),
        ];
        let embeddings: Vec<Vec<f32>> =
            chunks.iter().map(|c| embedder.embed(&c.content)).collect();
        index.index_chunks(&chunks, &embeddings).await.unwrap();

        let query = embedder.embed("machine learning");

        let all = index
            .search_chunks(&query, &SearchFilter::default(), 10)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].distance <= all[1].distance);

        let course_only = index
            .search_chunks(&query, &SearchFilter::by_course("Course A"), 10)
            .await
            .unwrap();
        assert_eq!(course_only.len(), 2);
        assert!(course_only.iter().all(|hit| hit.course_title == "Course A"));

        let both = index
            .search_chunks(
                &query,
                &SearchFilter {
                    course_title: Some("Course A".to_string()),
                    lesson_number: Some(1),
                },
                10,
            )
            .await
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].lesson_number, Some(1));

        let limited = index
            .search_chunks(&query, &SearchFilter::default(), 1)
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn resolve_on_empty_catalog_is_none() {
        let index = MemoryIndex::new();
        let embedder = HashedTrigramEmbedder::default();
        let resolved = index
            .resolve_course(&embedder.embed("anything"))
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn resolve_returns_nearest_title() {
        let index = MemoryIndex::new();
        let embedder = HashedTrigramEmbedder::default();

        for title in ["MCP: Build Rich-Context AI Apps", "Prompt Compression"] {
            index
                .upsert_course(&entry(title), &embedder.embed(title))
                .await
                .unwrap();
        }

        let (title, distance) = index
            .resolve_course(&embedder.embed("MCP: Build Rich-Context AI Apps"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(title, "MCP: Build Rich-Context AI Apps");
        assert!(distance < 0.01);
    }

    #[tokio::test]
    async fn clear_empties_both_collections() {
        let index = MemoryIndex::new();
        let embedder = HashedTrigramEmbedder::default();

        index
            .upsert_course(&entry("Course A"), &embedder.embed("Course A"))
            .await
            .unwrap();
        let chunks = vec![chunk("Course A", Some(0), 0, "text")];
        let embeddings = vec![embedder.embed("text")];
        index.index_chunks(&chunks, &embeddings).await.unwrap();

        CatalogIndex::clear(&index).await.unwrap();
        ContentIndex::clear(&index).await.unwrap();

        assert_eq!(index.course_count().await.unwrap(), 0);
        assert_eq!(index.chunk_count(), 0);
    }
}
