use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::embeddings::{Chunker, EmbeddingClient};
use crate::ingest::{SyncEngine, SyncReport};
use crate::rag::{Answer, GeminiClient, Intent, RagEngine};
use crate::source::NotionClient;
use crate::store::ChunkStore;

async fn build_sync_engine(config: &Config) -> Result<SyncEngine> {
    let source = NotionClient::new(&config.notion).context("Failed to create Notion client")?;
    let store = ChunkStore::new(config)
        .await
        .context("Failed to initialize chunk store")?;
    store.ensure_indexes().await;
    let embedder =
        EmbeddingClient::new(&config.embedding).context("Failed to create embedding client")?;
    let chunker = Chunker::new(config.chunking).context("Failed to create chunker")?;

    Ok(SyncEngine::new(
        source,
        store,
        embedder,
        chunker,
        config.notion.page_size,
    ))
}

async fn build_rag_engine(config: &Config) -> Result<RagEngine> {
    let embedder =
        EmbeddingClient::new(&config.embedding).context("Failed to create embedding client")?;
    let store = ChunkStore::new(config)
        .await
        .context("Failed to initialize chunk store")?;
    store.ensure_indexes().await;
    let generator = GeminiClient::new(&config.gemini).context("Failed to create Gemini client")?;

    Ok(RagEngine::new(
        embedder,
        store,
        generator,
        config.gemini.max_context_chunks,
        config.gemini.min_similarity_score,
    ))
}

fn print_report(report: &SyncReport) {
    println!("Database {}:", report.database_id);
    println!("  Indexed: {} pages", report.success);
    println!("  Skipped: {} pages", report.skipped);
    println!("  Errors:  {} pages", report.errors);
    println!("  Chunks written: {}", report.total_chunks);
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.answer);

    if !answer.sources.is_empty() {
        println!();
        println!("Sources ({}):", answer.sources.len());
        for source in &answer.sources {
            let title = source.title.as_deref().unwrap_or("(untitled)");
            println!("  - {} (score: {:.2})", title, source.score);
            if let Some(url) = &source.page_url {
                println!("    {url}");
            }
            println!("    {}", source.snippet);
        }
    }
}

/// Sync one database, or every configured database when `database` is `None`.
#[inline]
pub async fn sync(
    config_dir: &Path,
    database: Option<String>,
    force: bool,
    limit: Option<usize>,
) -> Result<()> {
    let config = Config::load(config_dir)?;
    let engine = build_sync_engine(&config).await?;

    match database {
        Some(database_id) => {
            let report = engine.sync_database(&database_id, force, limit).await?;
            print_report(&report);
        }
        None => {
            info!(
                "Syncing {} configured databases",
                config.notion.database_ids.len()
            );
            let engine = Arc::new(engine);
            let handles = engine.spawn_sync_all(&config.notion.database_ids, force);
            for handle in handles {
                match handle.await.context("Sync task panicked")? {
                    Ok(report) => print_report(&report),
                    Err(e) => {
                        warn!("Database sync failed: {}", e);
                        println!("Sync failed: {e}");
                    }
                }
            }
        }
    }

    Ok(())
}

/// Answer a question from the indexed knowledge base.
#[inline]
pub async fn ask(config_dir: &Path, question: &str) -> Result<()> {
    let config = Config::load(config_dir)?;
    let engine = build_rag_engine(&config).await?;

    let answer = engine.answer(question).await?;
    print_answer(&answer);

    Ok(())
}

/// Classify a free-form message and act on it: answer questions, trigger a
/// sync on sync requests.
#[inline]
pub async fn route(config_dir: &Path, message: &str) -> Result<()> {
    let config = Config::load(config_dir)?;
    let engine = build_rag_engine(&config).await?;

    match engine.identify_intent(message).await {
        Intent::Query => {
            let answer = engine.answer(message).await?;
            print_answer(&answer);
        }
        Intent::Sync => {
            println!("Starting knowledge base sync...");
            sync(config_dir, None, false, None).await?;
        }
        Intent::Unknown => {
            println!(
                "I couldn't tell whether you want to ask a question or sync the \
                 knowledge base. Try 'ask <question>' or 'sync'."
            );
        }
    }

    Ok(())
}

/// Show aggregate statistics about the chunk store.
#[inline]
pub async fn show_stats(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir)?;
    let store = ChunkStore::new(&config)
        .await
        .context("Failed to initialize chunk store")?;

    let stats = store.get_stats().await?;

    println!("Knowledge base statistics:");
    println!("  Chunks:    {}", stats.total_chunks);
    println!("  Pages:     {}", stats.unique_pages);
    println!("  Databases: {}", stats.unique_databases);
    println!(
        "  Storage:   {:.1} MiB",
        stats.storage_size_bytes as f64 / (1024.0 * 1024.0)
    );
    println!(
        "  Embeddings: {} ({} dimensions)",
        stats.embedding_model, stats.embedding_dimension
    );

    Ok(())
}

/// Check connectivity to every external dependency.
#[inline]
pub async fn health_check(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir)?;
    let mut healthy = true;

    let source = NotionClient::new(&config.notion)?;
    match source.health_check().await {
        Ok(()) => println!("Notion API: ok"),
        Err(e) => {
            healthy = false;
            println!("Notion API: FAILED ({e})");
        }
    }

    let embedder = EmbeddingClient::new(&config.embedding)?;
    match embedder.health_check().await {
        Ok(()) => println!("Embedding server: ok"),
        Err(e) => {
            healthy = false;
            println!("Embedding server: FAILED ({e})");
        }
    }

    match ChunkStore::new(&config).await {
        Ok(_) => println!("Chunk store: ok"),
        Err(e) => {
            healthy = false;
            println!("Chunk store: FAILED ({e})");
        }
    }

    if !healthy {
        anyhow::bail!("One or more health checks failed");
    }

    Ok(())
}

/// Delete every stored chunk for a page.
#[inline]
pub async fn delete_page(config_dir: &Path, page_id: &str) -> Result<()> {
    let config = Config::load(config_dir)?;
    let store = ChunkStore::new(&config)
        .await
        .context("Failed to initialize chunk store")?;

    let deleted = store.delete_page(page_id).await?;
    if deleted == 0 {
        println!("No chunks found for page {page_id}");
    } else {
        println!("Deleted {deleted} chunks for page {page_id}");
    }

    Ok(())
}

/// Print the current configuration with credentials masked.
#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir)?;

    println!("Configuration ({}):", config_dir.display());
    println!("  Notion:");
    println!("    api_key: {}", mask(&config.notion.api_key));
    println!("    api_version: {}", config.notion.api_version);
    println!("    databases: {}", config.notion.database_ids.join(", "));
    println!("    page_size: {}", config.notion.page_size);
    println!("  Embedding:");
    println!(
        "    endpoint: {}://{}:{}",
        config.embedding.protocol, config.embedding.host, config.embedding.port
    );
    println!("    model: {}", config.embedding.model);
    println!("    dimension: {}", config.embedding.dimension);
    println!("  Gemini:");
    println!("    api_key: {}", mask(&config.gemini.api_key));
    println!("    model: {}", config.gemini.model);
    println!(
        "    max_context_chunks: {}",
        config.gemini.max_context_chunks
    );
    println!(
        "    min_similarity_score: {}",
        config.gemini.min_similarity_score
    );
    println!("  Chunking:");
    println!("    max_chunk_tokens: {}", config.chunking.max_chunk_tokens);
    println!(
        "    chunk_overlap_tokens: {}",
        config.chunking.chunk_overlap_tokens
    );

    Ok(())
}

fn mask(secret: &str) -> String {
    let chars = secret.chars().count();
    if chars <= 4 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(chars - 4).collect();
    format!("****{tail}")
}
