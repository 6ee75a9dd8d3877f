use chrono::Utc;
use clap::{Parser, Subcommand};
use course_search_core::{
    ingest_course_folder, CatalogIndex, Embedder, HashedTrigramEmbedder, PipelineConfig,
    QdrantIndex, RetrievalEngine,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "course-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Collection holding one catalog point per course
    #[arg(long, default_value = "course_catalog")]
    catalog_collection: String,

    /// Collection holding the chunked course material
    #[arg(long, default_value = "course_content")]
    content_collection: String,

    /// Chunk size in characters
    #[arg(long, default_value = "800")]
    chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[arg(long, default_value = "100")]
    chunk_overlap: usize,

    /// Maximum number of hits returned per search
    #[arg(long, default_value = "5")]
    max_results: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a folder of course transcript documents into both collections.
    Ingest {
        /// Folder containing course .txt documents.
        #[arg(long)]
        folder: String,
        /// Drop existing data before ingesting.
        #[arg(long, default_value_t = false)]
        clear: bool,
    },
    /// Search course material, optionally scoped to a course and lesson.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
        /// Course name, full or partial.
        #[arg(long)]
        course: Option<String>,
        /// Lesson number within the course.
        #[arg(long)]
        lesson: Option<u32>,
        /// Override the configured maximum number of hits.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List the titles of all ingested courses.
    Courses,
    /// Print the outline of one course: title, link, and lesson list.
    Outline {
        /// Course name, full or partial.
        #[arg(long)]
        course: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = PipelineConfig {
        chunk_size: cli.chunk_size,
        chunk_overlap: cli.chunk_overlap,
        max_results: cli.max_results,
        ..PipelineConfig::default()
    };
    config
        .validate()
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let embedder = HashedTrigramEmbedder::default();
    let catalog = QdrantIndex::new(
        &cli.qdrant_url,
        &cli.catalog_collection,
        &cli.content_collection,
        embedder.dimensions(),
    );

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "course-search boot"
    );

    match cli.command {
        Command::Ingest { folder, clear } => {
            let path = std::path::Path::new(&folder);
            let content = QdrantIndex::new(
                &cli.qdrant_url,
                &cli.catalog_collection,
                &cli.content_collection,
                embedder.dimensions(),
            );
            catalog
                .ensure_collections()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            let report =
                ingest_course_folder(path, &catalog, &content, &embedder, &config, clear).await?;

            if !report.failed_documents.is_empty() {
                warn!(
                    "failed_documents={} for folder={}",
                    report.failed_documents.len(),
                    folder
                );
                for failed in &report.failed_documents {
                    warn!(path = %failed.path.display(), reason = %failed.reason, "skipped document");
                }
            }

            println!(
                "{} courses, {} chunks ingested at {}",
                report.courses_added,
                report.chunks_added,
                Utc::now().to_rfc3339()
            );
        }
        Command::Search {
            query,
            course,
            lesson,
            limit,
        } => {
            let content = QdrantIndex::new(
                &cli.qdrant_url,
                &cli.catalog_collection,
                &cli.content_collection,
                embedder.dimensions(),
            );
            let mut config = config;
            if let Some(limit) = limit {
                config.max_results = limit;
            }
            let engine = RetrievalEngine::new(catalog, content, embedder, config)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            let outcome = engine
                .search_course_content(&query, course.as_deref(), lesson)
                .await;

            println!("{}", outcome.answer);
            for source in outcome.sources {
                match source.url {
                    Some(url) => println!("source: {} ({url})", source.display_text),
                    None => println!("source: {}", source.display_text),
                }
            }
        }
        Command::Courses => {
            let count = catalog
                .course_count()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let titles = catalog
                .course_titles()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("{count} course(s)");
            for title in titles {
                println!("{title}");
            }
        }
        Command::Outline { course } => {
            let content = QdrantIndex::new(
                &cli.qdrant_url,
                &cli.catalog_collection,
                &cli.content_collection,
                embedder.dimensions(),
            );
            let engine = RetrievalEngine::new(catalog, content, embedder, config)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let outcome = engine.course_outline(&course).await;
            println!("{}", outcome.answer);
        }
    }

    Ok(())
}
