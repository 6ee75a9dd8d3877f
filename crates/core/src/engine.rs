use crate::embeddings::Embedder;
use crate::error::{IngestError, SearchError};
use crate::models::{
    CatalogEntry, CourseAnalytics, PipelineConfig, ScoredChunk, SearchFilter, SearchOutcome,
    SourceRef,
};
use crate::traits::{CatalogIndex, ContentIndex};
use std::collections::HashMap;

/// Top-level query entry point: resolves fuzzy course names against the
/// catalog, builds the metadata filter, queries the content collection, and
/// formats ranked passages with source attribution. Every call returns a
/// fresh [`SearchOutcome`]; the engine holds no per-request state and is
/// safe to share across concurrent queries.
pub struct RetrievalEngine<C, S, E>
where
    C: CatalogIndex,
    S: ContentIndex,
    E: Embedder,
{
    catalog: C,
    content: S,
    embedder: E,
    config: PipelineConfig,
}

impl<C, S, E> RetrievalEngine<C, S, E>
where
    C: CatalogIndex + Send + Sync,
    S: ContentIndex + Send + Sync,
    E: Embedder + Send + Sync,
{
    pub fn new(
        catalog: C,
        content: S,
        embedder: E,
        config: PipelineConfig,
    ) -> Result<Self, IngestError> {
        config.validate()?;
        Ok(Self {
            catalog,
            content,
            embedder,
            config,
        })
    }

    /// Map a partial or fuzzy course name to its canonical catalog title.
    ///
    /// Case-insensitive substring containment wins first, so `"MCP"` hits
    /// `"MCP: Build Rich-Context AI Apps"` exactly. Otherwise the nearest
    /// catalog embedding is taken, rejected when its distance exceeds the
    /// configured cutoff.
    pub async fn resolve_course_title(
        &self,
        partial: &str,
    ) -> Result<Option<String>, SearchError> {
        let needle = partial.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        let query_vector = self.embedder.embed(partial);

        let candidates: Vec<String> = self
            .catalog
            .course_titles()
            .await?
            .into_iter()
            .filter(|title| title.to_lowercase().contains(&needle))
            .collect();
        if !candidates.is_empty() {
            // Multiple containment hits: fall back to semantic closeness.
            let best = candidates
                .into_iter()
                .map(|title| {
                    let distance =
                        crate::embeddings::cosine_distance(&query_vector, &self.embedder.embed(&title));
                    (title, distance)
                })
                .min_by(|left, right| left.1.total_cmp(&right.1))
                .map(|(title, _)| title);
            return Ok(best);
        }

        match self.catalog.resolve_course(&query_vector).await? {
            Some((title, distance)) => {
                if let Some(cutoff) = self.config.max_resolve_distance {
                    if distance > cutoff {
                        return Ok(None);
                    }
                }
                Ok(Some(title))
            }
            None => Ok(None),
        }
    }

    /// Answer one content query, optionally narrowed to a course and/or a
    /// lesson. Errors never escape: failed name resolution, an unreachable
    /// index, and empty result sets all fold into the answer text.
    pub async fn search_course_content(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> SearchOutcome {
        let mut filter = SearchFilter::default();

        if let Some(name) = course_name {
            match self.resolve_course_title(name).await {
                Ok(Some(title)) => filter.course_title = Some(title),
                Ok(None) => {
                    return SearchOutcome::message(format!("No course found matching '{name}'"))
                }
                Err(error) => return failure_outcome(&error),
            }
        }
        filter.lesson_number = lesson_number;

        let query_vector = self.embedder.embed(query);
        let hits = match self
            .content
            .search_chunks(&query_vector, &filter, self.config.max_results)
            .await
        {
            Ok(hits) => hits,
            Err(error) => return failure_outcome(&error),
        };

        if hits.is_empty() {
            return SearchOutcome::message(no_content_message(course_name, lesson_number));
        }

        self.format_hits(&hits).await
    }

    async fn format_hits(&self, hits: &[ScoredChunk]) -> SearchOutcome {
        let mut entries: HashMap<String, Option<CatalogEntry>> = HashMap::new();
        let mut blocks = Vec::with_capacity(hits.len());
        let mut sources = Vec::with_capacity(hits.len());

        for hit in hits {
            let header = match hit.lesson_number {
                Some(number) => format!("[{} - Lesson {}]", hit.course_title, number),
                None => format!("[{}]", hit.course_title),
            };
            blocks.push(format!("{header}\n{}", hit.content));

            let entry = match entries.get(&hit.course_title) {
                Some(cached) => cached.clone(),
                None => {
                    let fetched = self
                        .catalog
                        .course_entry(&hit.course_title)
                        .await
                        .ok()
                        .flatten();
                    entries.insert(hit.course_title.clone(), fetched.clone());
                    fetched
                }
            };

            let (display_text, url) = match hit.lesson_number {
                Some(number) => (
                    format!("{} - Lesson {}", hit.course_title, number),
                    entry.as_ref().and_then(|entry| entry.lesson_link(number)),
                ),
                None => (
                    hit.course_title.clone(),
                    entry.as_ref().and_then(|entry| entry.course_link.clone()),
                ),
            };
            sources.push(SourceRef { display_text, url });
        }

        SearchOutcome {
            answer: blocks.join("\n\n"),
            sources,
        }
    }

    /// Resolved course's title, link, and numbered lesson list.
    pub async fn course_outline(&self, course_name: &str) -> SearchOutcome {
        let title = match self.resolve_course_title(course_name).await {
            Ok(Some(title)) => title,
            Ok(None) => {
                return SearchOutcome::message(format!(
                    "No course found matching '{course_name}'"
                ))
            }
            Err(error) => return failure_outcome(&error),
        };

        let entry = match self.catalog.course_entry(&title).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                return SearchOutcome::message(format!("No course found matching '{course_name}'"))
            }
            Err(error) => return failure_outcome(&error),
        };

        let mut lines = vec![format!("Course: {}", entry.title)];
        if let Some(link) = &entry.course_link {
            lines.push(format!("Link: {link}"));
        }
        if let Some(instructor) = &entry.instructor {
            lines.push(format!("Instructor: {instructor}"));
        }
        for lesson in entry.lessons().unwrap_or_default() {
            lines.push(format!("Lesson {}: {}", lesson.number, lesson.title));
        }

        SearchOutcome {
            answer: lines.join("\n"),
            sources: vec![SourceRef {
                display_text: entry.title.clone(),
                url: entry.course_link.clone(),
            }],
        }
    }

    pub async fn analytics(&self) -> Result<CourseAnalytics, SearchError> {
        Ok(CourseAnalytics {
            total_courses: self.catalog.course_count().await?,
            course_titles: self.catalog.course_titles().await?,
        })
    }
}

fn failure_outcome(error: &SearchError) -> SearchOutcome {
    SearchOutcome::message(format!("Search error: {error}"))
}

fn no_content_message(course_name: Option<&str>, lesson_number: Option<u32>) -> String {
    let mut message = String::from("No relevant content found");
    if let Some(name) = course_name {
        message.push_str(&format!(" in course '{name}'"));
    }
    if let Some(number) = lesson_number {
        message.push_str(&format!(" in lesson {number}"));
    }
    message.push('.');
    message
}
