use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One parsed course document. Immutable once the parser returns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Course {
    pub title: String,
    pub course_link: Option<String>,
    pub instructor: Option<String>,
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lesson {
    pub number: u32,
    pub title: String,
    pub link: Option<String>,
}

/// A context-prefixed span of lesson text, ready to embed and store.
/// `lesson_number` is `None` for chunks cut from text that precedes the
/// first lesson marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourseChunk {
    pub content: String,
    pub course_title: String,
    pub lesson_number: Option<u32>,
    pub chunk_index: u64,
}

impl CourseChunk {
    /// Stable identity key; re-indexing the same course overwrites rather
    /// than duplicates.
    pub fn identity(&self) -> String {
        format!("{}_{}", self.course_title, self.chunk_index)
    }
}

/// Course-level record kept in the catalog collection, embedded on title
/// text for fuzzy name resolution. The lesson list rides along as a JSON
/// side attribute so catalog rows stay flat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    pub instructor: Option<String>,
    pub course_link: Option<String>,
    pub lessons_json: String,
    pub ingested_at: DateTime<Utc>,
}

impl CatalogEntry {
    pub fn from_course(course: &Course) -> Result<Self, serde_json::Error> {
        Ok(Self {
            title: course.title.clone(),
            instructor: course.instructor.clone(),
            course_link: course.course_link.clone(),
            lessons_json: serde_json::to_string(&course.lessons)?,
            ingested_at: Utc::now(),
        })
    }

    pub fn lessons(&self) -> Result<Vec<Lesson>, serde_json::Error> {
        serde_json::from_str(&self.lessons_json)
    }

    pub fn lesson_link(&self, number: u32) -> Option<String> {
        self.lessons()
            .ok()?
            .into_iter()
            .find(|lesson| lesson.number == number)
            .and_then(|lesson| lesson.link)
    }
}

/// Equality constraints narrowing a content search. Both fields optional;
/// an empty filter matches everything.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SearchFilter {
    pub course_title: Option<String>,
    pub lesson_number: Option<u32>,
}

impl SearchFilter {
    pub fn by_course(title: impl Into<String>) -> Self {
        Self {
            course_title: Some(title.into()),
            lesson_number: None,
        }
    }

    pub fn by_lesson(number: u32) -> Self {
        Self {
            course_title: None,
            lesson_number: Some(number),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.course_title.is_none() && self.lesson_number.is_none()
    }

    pub fn matches(&self, chunk: &CourseChunk) -> bool {
        if let Some(title) = &self.course_title {
            if &chunk.course_title != title {
                return false;
            }
        }
        if let Some(number) = self.lesson_number {
            if chunk.lesson_number != Some(number) {
                return false;
            }
        }
        true
    }
}

/// One content hit, ascending `distance` (lower = more similar).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub content: String,
    pub course_title: String,
    pub lesson_number: Option<u32>,
    pub chunk_index: u64,
    pub distance: f32,
}

/// Lightweight attribution record for UI display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRef {
    pub display_text: String,
    pub url: Option<String>,
}

/// Per-request retrieval result: the formatted answer plus the sources that
/// produced it. Returned by value so no shared state survives the call.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchOutcome {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

impl SearchOutcome {
    pub fn message(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
        }
    }
}

/// Catalog summary for status displays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

/// Pipeline-wide constants. Validated once at startup; overlap must stay
/// strictly below chunk size.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Characters of trailing context re-included in the next chunk.
    pub chunk_overlap: usize,
    /// Maximum hits returned per content search.
    pub max_results: usize,
    /// Reject fuzzy course-name matches above this cosine distance.
    /// `None` always accepts the nearest catalog entry.
    pub max_resolve_distance: Option<f32>,
    /// Dimensionality of the embedding space.
    pub embedding_dimensions: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
            max_results: 5,
            max_resolve_distance: Some(0.6),
            embedding_dimensions: 256,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), crate::error::IngestError> {
        if self.chunk_size == 0 {
            return Err(crate::error::IngestError::InvalidChunkConfig(
                "chunk size must be positive".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(crate::error::IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than chunk size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_on_both_dimensions() {
        let chunk = CourseChunk {
            content: "Course X Lesson 2 content: body".to_string(),
            course_title: "X".to_string(),
            lesson_number: Some(2),
            chunk_index: 0,
        };

        let both = SearchFilter {
            course_title: Some("X".to_string()),
            lesson_number: Some(2),
        };
        assert!(both.matches(&chunk));
        assert!(SearchFilter::by_course("X").matches(&chunk));
        assert!(SearchFilter::by_lesson(2).matches(&chunk));
        assert!(SearchFilter::default().matches(&chunk));
        assert!(!SearchFilter::by_course("Y").matches(&chunk));
        assert!(!SearchFilter::by_lesson(3).matches(&chunk));
    }

    #[test]
    fn lesson_filter_never_matches_preamble_chunks() {
        let preamble = CourseChunk {
            content: "Course X content: intro".to_string(),
            course_title: "X".to_string(),
            lesson_number: None,
            chunk_index: 0,
        };
        // Lesson 0 is a real lesson; the preamble must not alias it.
        assert!(!SearchFilter::by_lesson(0).matches(&preamble));
    }

    #[test]
    fn catalog_entry_round_trips_lessons() {
        let course = Course {
            title: "Test Course".to_string(),
            course_link: Some("https://example.com/course".to_string()),
            instructor: Some("Test Instructor".to_string()),
            lessons: vec![
                Lesson {
                    number: 0,
                    title: "Intro".to_string(),
                    link: Some("https://example.com/lesson/0".to_string()),
                },
                Lesson {
                    number: 3,
                    title: "Advanced".to_string(),
                    link: None,
                },
            ],
        };

        let entry = CatalogEntry::from_course(&course).unwrap();
        assert_eq!(entry.lessons().unwrap(), course.lessons);
        assert_eq!(
            entry.lesson_link(0).as_deref(),
            Some("https://example.com/lesson/0")
        );
        assert_eq!(entry.lesson_link(3), None);
        assert_eq!(entry.lesson_link(99), None);
    }

    #[test]
    fn config_rejects_overlap_not_below_chunk_size() {
        let mut config = PipelineConfig::default();
        assert!(config.validate().is_ok());

        config.chunk_overlap = config.chunk_size;
        assert!(config.validate().is_err());

        config.chunk_overlap = config.chunk_size + 1;
        assert!(config.validate().is_err());
    }
}
