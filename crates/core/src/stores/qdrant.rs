use crate::error::SearchError;
use crate::models::{CatalogEntry, CourseChunk, ScoredChunk, SearchFilter};
use crate::traits::{CatalogIndex, ContentIndex};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Remote backend over two Qdrant collections: `course_catalog` holds one
/// point per course embedded on title text; `course_content` holds one
/// point per chunk. Point ids are derived from the identity keys so writes
/// are idempotent upserts.
pub struct QdrantIndex {
    endpoint: String,
    catalog_collection: String,
    content_collection: String,
    client: Client,
    vector_size: usize,
}

impl QdrantIndex {
    pub fn new(
        endpoint: impl Into<String>,
        catalog_collection: impl Into<String>,
        content_collection: impl Into<String>,
        vector_size: usize,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            catalog_collection: catalog_collection.into(),
            content_collection: content_collection.into(),
            client: Client::new(),
            vector_size,
        }
    }

    /// Create both collections if they do not exist yet.
    pub async fn ensure_collections(&self) -> Result<(), SearchError> {
        for collection in [&self.catalog_collection, &self.content_collection] {
            let response = self
                .client
                .put(format!("{}/collections/{}", self.endpoint, collection))
                .json(&json!({
                    "vectors": { "size": self.vector_size, "distance": "Cosine" }
                }))
                .send()
                .await?;

            // 409 means the collection is already there.
            if !response.status().is_success() && response.status().as_u16() != 409 {
                return Err(SearchError::BackendResponse {
                    backend: "qdrant".to_string(),
                    details: response.status().to_string(),
                });
            }
        }
        Ok(())
    }

    async fn upsert_points(&self, collection: &str, points: Vec<Value>) -> Result<(), SearchError> {
        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .put(format!(
                "{}/collections/{}/points?wait=true",
                self.endpoint, collection
            ))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(())
    }

    async fn search_points(
        &self,
        collection: &str,
        query_vector: &[f32],
        filter: Option<Value>,
        limit: usize,
    ) -> Result<Vec<Value>, SearchError> {
        if query_vector.len() != self.vector_size {
            return Err(SearchError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.vector_size
            )));
        }

        let mut body = json!({
            "vector": query_vector,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(filter) = filter {
            body["filter"] = filter;
        }

        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/search",
                self.endpoint, collection
            ))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        Ok(parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    async fn scroll_payloads(
        &self,
        collection: &str,
        filter: Option<Value>,
        limit: usize,
    ) -> Result<Vec<Value>, SearchError> {
        let mut body = json!({ "limit": limit, "with_payload": true });
        if let Some(filter) = filter {
            body["filter"] = filter;
        }

        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/scroll",
                self.endpoint, collection
            ))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        Ok(parsed
            .pointer("/result/points")
            .and_then(Value::as_array)
            .map(|points| {
                points
                    .iter()
                    .filter_map(|point| point.get("payload").cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn drop_and_recreate(&self, collection: &str) -> Result<(), SearchError> {
        let response = self
            .client
            .delete(format!("{}/collections/{}", self.endpoint, collection))
            .send()
            .await?;
        if !response.status().is_success() && response.status().as_u16() != 404 {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let response = self
            .client
            .put(format!("{}/collections/{}", self.endpoint, collection))
            .json(&json!({
                "vectors": { "size": self.vector_size, "distance": "Cosine" }
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(())
    }
}

/// Stable numeric point id from an identity key.
pub(crate) fn point_id(identity: &str) -> u64 {
    let digest = Sha256::digest(identity.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

fn filter_clauses(filter: &SearchFilter) -> Option<Value> {
    let mut must = Vec::new();
    if let Some(title) = &filter.course_title {
        must.push(json!({ "key": "course_title", "match": { "value": title } }));
    }
    if let Some(number) = filter.lesson_number {
        must.push(json!({ "key": "lesson_number", "match": { "value": number } }));
    }
    if must.is_empty() {
        None
    } else {
        Some(json!({ "must": must }))
    }
}

/// Qdrant reports cosine similarity; callers rank by ascending distance.
fn score_to_distance(score: f64) -> f32 {
    (1.0 - score) as f32
}

#[async_trait]
impl CatalogIndex for QdrantIndex {
    async fn upsert_course(
        &self,
        entry: &CatalogEntry,
        embedding: &[f32],
    ) -> Result<(), SearchError> {
        if embedding.len() != self.vector_size {
            return Err(SearchError::Request(format!(
                "embedding dimension {} != {}",
                embedding.len(),
                self.vector_size
            )));
        }

        let point = json!({
            "id": point_id(&entry.title),
            "vector": embedding,
            "payload": serde_json::to_value(entry)?,
        });
        self.upsert_points(&self.catalog_collection, vec![point])
            .await
    }

    async fn course_titles(&self) -> Result<Vec<String>, SearchError> {
        let payloads = self
            .scroll_payloads(&self.catalog_collection, None, 1024)
            .await?;
        let mut titles: Vec<String> = payloads
            .iter()
            .filter_map(|payload| payload.get("title").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        titles.sort();
        Ok(titles)
    }

    async fn course_count(&self) -> Result<usize, SearchError> {
        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/count",
                self.endpoint, self.catalog_collection
            ))
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        Ok(parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize)
    }

    async fn course_entry(&self, title: &str) -> Result<Option<CatalogEntry>, SearchError> {
        let filter = json!({
            "must": [{ "key": "title", "match": { "value": title } }]
        });
        let payloads = self
            .scroll_payloads(&self.catalog_collection, Some(filter), 1)
            .await?;
        match payloads.into_iter().next() {
            Some(payload) => Ok(Some(serde_json::from_value(payload)?)),
            None => Ok(None),
        }
    }

    async fn resolve_course(
        &self,
        query_vector: &[f32],
    ) -> Result<Option<(String, f32)>, SearchError> {
        let hits = self
            .search_points(&self.catalog_collection, query_vector, None, 1)
            .await?;

        Ok(hits.first().and_then(|hit| {
            let title = hit.pointer("/payload/title").and_then(Value::as_str)?;
            let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);
            Some((title.to_string(), score_to_distance(score)))
        }))
    }

    async fn clear(&self) -> Result<(), SearchError> {
        self.drop_and_recreate(&self.catalog_collection).await
    }
}

#[async_trait]
impl ContentIndex for QdrantIndex {
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

        let points = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, embedding)| {
                if embedding.len() != self.vector_size {
                    return Err(SearchError::Request(format!(
                        "embedding dimension {} != {}",
                        embedding.len(),
                        self.vector_size
                    )));
                }

                Ok(json!({
                    "id": point_id(&chunk.identity()),
                    "vector": embedding,
                    "payload": {
                        "content": chunk.content,
                        "course_title": chunk.course_title,
                        "lesson_number": chunk.lesson_number,
                        "chunk_index": chunk.chunk_index,
                    },
                }))
            })
            .collect::<Result<Vec<_>, SearchError>>()?;

        self.upsert_points(&self.content_collection, points).await
    }

    async fn search_chunks(
        &self,
        query_vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, SearchError> {
        let hits = self
            .search_points(
                &self.content_collection,
                query_vector,
                filter_clauses(filter),
                limit,
            )
            .await?;

        let mut result = Vec::new();
        for hit in hits {
            let content = hit
                .pointer("/payload/content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let course_title = hit
                .pointer("/payload/course_title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let lesson_number = hit
                .pointer("/payload/lesson_number")
                .and_then(Value::as_u64)
                .map(|number| number as u32);
            let chunk_index = hit
                .pointer("/payload/chunk_index")
                .and_then(Value::as_u64)
                .unwrap_or_default();
            let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);

            result.push(ScoredChunk {
                content,
                course_title,
                lesson_number,
                chunk_index,
                distance: score_to_distance(score),
            });
        }

        Ok(result)
    }

    async fn clear(&self) -> Result<(), SearchError> {
        self.drop_and_recreate(&self.content_collection).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_ids_are_stable_and_distinct() {
        let first = point_id("Test Course_0");
        assert_eq!(first, point_id("Test Course_0"));
        assert_ne!(first, point_id("Test Course_1"));
    }

    #[test]
    fn filter_clauses_cover_all_combinations() {
        assert!(filter_clauses(&SearchFilter::default()).is_none());

        let course = filter_clauses(&SearchFilter::by_course("Test Course")).unwrap();
        assert_eq!(course["must"].as_array().map(Vec::len), Some(1));

        let both = filter_clauses(&SearchFilter {
            course_title: Some("Test Course".to_string()),
            lesson_number: Some(2),
        })
        .unwrap();
        assert_eq!(both["must"].as_array().map(Vec::len), Some(2));
        assert_eq!(both["must"][1]["key"], "lesson_number");
        assert_eq!(both["must"][1]["match"]["value"], 2);
    }

    #[test]
    fn distances_invert_similarity_scores() {
        assert!(score_to_distance(0.95) < score_to_distance(0.2));
        assert!((score_to_distance(1.0)).abs() < 1e-6);
    }
}
