use crate::chunking::{build_course_chunks, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::IngestError;
use crate::models::{CatalogEntry, PipelineConfig};
use crate::parser::parse_course_document;
use crate::traits::{CatalogIndex, ContentIndex};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub struct FailedDocument {
    pub path: PathBuf,
    pub reason: String,
}

/// Aggregate outcome of one folder run. Parse failures are collected here,
/// never aborting the remaining files.
#[derive(Default)]
pub struct IngestReport {
    pub courses_added: usize,
    pub chunks_added: usize,
    pub failed_documents: Vec<FailedDocument>,
}

pub fn discover_course_documents(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_document = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));

        if is_document {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Walk `folder` and load every course document not yet in the catalog.
///
/// Courses whose title already exists are skipped without touching either
/// collection. With `clear_existing` both collections are wiped before the
/// walk. A missing folder yields an empty report.
pub async fn ingest_course_folder<C, S, E>(
    folder: &Path,
    catalog: &C,
    content: &S,
    embedder: &E,
    config: &PipelineConfig,
    clear_existing: bool,
) -> Result<IngestReport, IngestError>
where
    C: CatalogIndex + Sync,
    S: ContentIndex + Sync,
    E: Embedder + Sync,
{
    config.validate()?;

    if clear_existing {
        catalog.clear().await?;
        content.clear().await?;
    }

    let mut report = IngestReport::default();
    if !folder.is_dir() {
        return Ok(report);
    }

    for path in discover_course_documents(folder) {
        match ingest_one(&path, catalog, content, embedder, config).await {
            Ok(Some(chunk_count)) => {
                report.courses_added += 1;
                report.chunks_added += chunk_count;
            }
            Ok(None) => {} // duplicate title, skipped
            Err(error) => report.failed_documents.push(FailedDocument {
                path,
                reason: error.to_string(),
            }),
        }
    }

    Ok(report)
}

/// Returns the number of chunks written, or `None` when the course title
/// was already in the catalog.
async fn ingest_one<C, S, E>(
    path: &Path,
    catalog: &C,
    content: &S,
    embedder: &E,
    config: &PipelineConfig,
) -> Result<Option<usize>, IngestError>
where
    C: CatalogIndex + Sync,
    S: ContentIndex + Sync,
    E: Embedder + Sync,
{
    let text = fs::read_to_string(path)?;
    let parsed = parse_course_document(&text)?;

    if catalog.course_exists(&parsed.course.title).await? {
        return Ok(None);
    }

    let chunks = build_course_chunks(&parsed, ChunkingConfig::from(config))?;
    let embeddings: Vec<Vec<f32>> = chunks
        .iter()
        .map(|chunk| embedder.embed(&chunk.content))
        .collect();

    let entry = CatalogEntry::from_course(&parsed.course)?;
    catalog
        .upsert_course(&entry, &embedder.embed(&parsed.course.title))
        .await?;
    content.index_chunks(&chunks, &embeddings).await?;

    Ok(Some(chunks.len()))
}
