// Ingest module
// Incremental synchronization from Notion databases into the chunk store


use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::embeddings::{Chunker, EmbeddingClient, count_tokens};
use crate::source::{DatabaseQuery, NotionClient, Page, extract_page_text};
use crate::store::{ChunkStore, NewChunk, PageMetadata};
use crate::{BrainError, Result};

/// Outcome counts for one database sync.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncReport {
    pub database_id: String,
    /// Pages whose chunks were (re)indexed.
    pub success: usize,
    /// Pages left untouched: already up to date, or no extractable text.
    pub skipped: usize,
    /// Pages that failed; their previously stored chunks are untouched.
    pub errors: usize,
    /// Chunks written across all successfully indexed pages.
    pub total_chunks: usize,
}

impl SyncReport {
    fn new(database_id: &str) -> Self {
        Self {
            database_id: database_id.to_string(),
            success: 0,
            skipped: 0,
            errors: 0,
            total_chunks: 0,
        }
    }
}

enum PageOutcome {
    Indexed(usize),
    UpToDate,
    NoContent,
}

/// Drives the fetch, chunk, embed, store pipeline for whole databases.
///
/// Every collaborator is handed in explicitly; the engine holds no global
/// state beyond the in-flight set guarding concurrent syncs of the same
/// database.
pub struct SyncEngine {
    source: NotionClient,
    store: ChunkStore,
    embedder: EmbeddingClient,
    chunker: Chunker,
    page_size: u32,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl SyncEngine {
    pub fn new(
        source: NotionClient,
        store: ChunkStore,
        embedder: EmbeddingClient,
        chunker: Chunker,
        page_size: u32,
    ) -> Self {
        Self {
            source,
            store,
            embedder,
            chunker,
            page_size,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Synchronize one database into the chunk store.
    ///
    /// Pages are processed independently: a failing page is counted and logged
    /// without aborting the rest of the batch. `page_limit` caps how many
    /// pages are examined; `force_update` reindexes pages even when their
    /// last-edited timestamp is unchanged.
    ///
    /// Returns a [`BrainError::Sync`] immediately when a sync for the same
    /// database is already running.
    pub async fn sync_database(
        &self,
        database_id: &str,
        force_update: bool,
        page_limit: Option<usize>,
    ) -> Result<SyncReport> {
        let _permit = SyncPermit::acquire(&self.in_flight, database_id)?;

        info!(
            "Syncing database {} (force_update: {}, page_limit: {:?})",
            database_id, force_update, page_limit
        );

        let mut report = SyncReport::new(database_id);
        let mut cursor: Option<String> = None;
        let mut pages_seen = 0usize;

        'batches: loop {
            let query = DatabaseQuery {
                page_size: Some(self.page_size),
                start_cursor: cursor.clone(),
                ..DatabaseQuery::default()
            };
            let batch = self.source.query_database(database_id, &query).await?;

            for page in batch.results {
                if page_limit.is_some_and(|limit| pages_seen >= limit) {
                    debug!("Page limit reached for database {}", database_id);
                    break 'batches;
                }
                pages_seen += 1;

                match self.sync_page(database_id, &page, force_update).await {
                    Ok(PageOutcome::Indexed(chunks)) => {
                        report.success += 1;
                        report.total_chunks += chunks;
                    }
                    Ok(PageOutcome::UpToDate) => {
                        debug!("Page {} is up to date, skipping", page.id);
                        report.skipped += 1;
                    }
                    Ok(PageOutcome::NoContent) => {
                        debug!("Page {} has no extractable text, skipping", page.id);
                        report.skipped += 1;
                    }
                    Err(e) => {
                        warn!("Failed to sync page {}: {}", page.id, e);
                        report.errors += 1;
                    }
                }
            }

            match (batch.has_more, batch.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        info!(
            "Sync of database {} finished: {} indexed, {} skipped, {} errors, {} chunks",
            database_id, report.success, report.skipped, report.errors, report.total_chunks
        );
        Ok(report)
    }

    /// Spawn one detached sync task per database.
    ///
    /// The returned handles can be awaited for the reports; dropping them
    /// leaves the syncs running to completion.
    pub fn spawn_sync_all(
        self: &Arc<Self>,
        database_ids: &[String],
        force_update: bool,
    ) -> Vec<JoinHandle<Result<SyncReport>>> {
        database_ids
            .iter()
            .map(|id| {
                let engine = Arc::clone(self);
                let database_id = id.clone();
                tokio::spawn(async move {
                    let result = engine.sync_database(&database_id, force_update, None).await;
                    if let Err(e) = &result {
                        error!("Background sync of {} failed: {}", database_id, e);
                    }
                    result
                })
            })
            .collect()
    }

    async fn sync_page(
        &self,
        database_id: &str,
        page: &Page,
        force_update: bool,
    ) -> Result<PageOutcome> {
        if !force_update {
            let stored = self.store.find_existing(&page.id).await?;
            if stored.as_deref() == Some(page.last_edited_time.as_str()) {
                return Ok(PageOutcome::UpToDate);
            }
        }

        let blocks = self.source.list_block_children(&page.id).await?;
        let text = extract_page_text(page, &blocks);

        let contents = self.chunker.chunk(&text);
        if contents.is_empty() {
            return Ok(PageOutcome::NoContent);
        }

        let mut chunks = Vec::with_capacity(contents.len());
        for (index, content) in contents.into_iter().enumerate() {
            let embedding = self.embedder.embed(&content).await?;
            let token_count = count_tokens(&content) as u32;
            chunks.push(NewChunk {
                chunk_index: index as u32,
                content,
                embedding,
                token_count,
            });
        }

        let meta = PageMetadata {
            page_id: page.id.clone(),
            database_id: database_id.to_string(),
            page_url: page.url.clone(),
            properties_json: serde_json::to_string(&page.properties)
                .map_err(|e| BrainError::Sync(format!("Failed to serialize properties: {e}")))?,
            last_edited_time: page.last_edited_time.clone(),
        };

        let stored = self.store.replace_chunks(&meta, chunks).await?;
        debug!("Indexed page {} into {} chunks", page.id, stored);
        Ok(PageOutcome::Indexed(stored))
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }
}

/// Membership in the in-flight set for one database, released on drop.
struct SyncPermit {
    in_flight: Arc<Mutex<HashSet<String>>>,
    database_id: String,
}

impl SyncPermit {
    fn acquire(in_flight: &Arc<Mutex<HashSet<String>>>, database_id: &str) -> Result<Self> {
        let mut set = in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(database_id.to_string()) {
            return Err(BrainError::Sync(format!(
                "Sync already in progress for database {database_id}"
            )));
        }
        Ok(Self {
            in_flight: Arc::clone(in_flight),
            database_id: database_id.to_string(),
        })
    }
}

impl Drop for SyncPermit {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.database_id);
    }
}
