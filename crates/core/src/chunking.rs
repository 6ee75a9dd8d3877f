use crate::error::IngestError;
use crate::models::{CourseChunk, PipelineConfig};
use crate::parser::ParsedDocument;
use regex::Regex;

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl From<&PipelineConfig> for ChunkingConfig {
    fn from(value: &PipelineConfig) -> Self {
        Self {
            chunk_size: value.chunk_size,
            overlap: value.chunk_overlap,
        }
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split normalized text at sentence terminators followed by whitespace.
/// Never breaks inside a word; trailing text without a terminator becomes
/// the last sentence.
pub fn split_sentences(text: &str) -> Result<Vec<String>, IngestError> {
    let boundary = Regex::new(r"[.!?]+\s+")?;

    let mut sentences = Vec::new();
    let mut start = 0;
    for found in boundary.find_iter(text) {
        let sentence = text[start..found.end()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence.to_string());
        }
        start = found.end();
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    Ok(sentences)
}

/// Greedily pack sentences into windows of at most `chunk_size` characters,
/// re-including trailing sentences of the previous window until at least
/// `overlap` characters are shared. A single sentence longer than the window
/// is emitted as its own oversized chunk.
pub fn chunk_text(text: &str, config: ChunkingConfig) -> Result<Vec<String>, IngestError> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Ok(Vec::new());
    }

    let sentences = split_sentences(&normalized)?;
    let lengths: Vec<usize> = sentences
        .iter()
        .map(|sentence| sentence.chars().count())
        .collect();

    let mut chunks = Vec::new();
    let mut window_start = 0;

    while window_start < sentences.len() {
        let mut size = 0;
        let mut end = window_start;
        while end < sentences.len() {
            let added = lengths[end] + usize::from(end > window_start);
            if size + added > config.chunk_size && end > window_start {
                break;
            }
            size += added;
            end += 1;
        }

        chunks.push(sentences[window_start..end].join(" "));

        if end >= sentences.len() {
            break;
        }

        let mut next_start = end;
        if config.overlap > 0 {
            let mut overlap_size = 0;
            while next_start > window_start && overlap_size < config.overlap {
                next_start -= 1;
                overlap_size += lengths[next_start] + 1;
            }
        }
        // The window must always advance.
        window_start = next_start.max(window_start + 1);
    }

    Ok(chunks)
}

fn lesson_context(course_title: &str, lesson_number: Option<u32>) -> String {
    match lesson_number {
        Some(number) => format!("Course {course_title} Lesson {number} content: "),
        None => format!("Course {course_title} content: "),
    }
}

/// Chunk every lesson body plus any preamble of one parsed document.
/// Chunk indices run monotonically across the whole course, never resetting
/// per lesson, and every chunk text carries its rendered context prefix.
pub fn build_course_chunks(
    parsed: &ParsedDocument,
    config: ChunkingConfig,
) -> Result<Vec<CourseChunk>, IngestError> {
    let title = &parsed.course.title;

    let mut chunks = Vec::new();
    let mut cursor = 0u64;

    let mut sections: Vec<(Option<u32>, &str)> = Vec::new();
    if let Some(preamble) = &parsed.preamble {
        sections.push((None, preamble.as_str()));
    }
    for (number, body) in &parsed.lesson_bodies {
        sections.push((Some(*number), body.as_str()));
    }

    for (lesson_number, body) in sections {
        let prefix = lesson_context(title, lesson_number);
        for piece in chunk_text(body, config)? {
            chunks.push(CourseChunk {
                content: format!("{prefix}{piece}"),
                course_title: title.clone(),
                lesson_number,
                chunk_index: cursor,
            });
            cursor += 1;
        }
    }

    Ok(chunks)
}
