
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::index::Index;
use lancedb::index::scalar::{FtsIndexBuilder, FullTextSearchQuery};
use lancedb::{
    Connection, DistanceType,
    query::{ExecutableQuery, QueryBase, Select},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{NewChunk, PageMetadata, SearchResult, StoreStats};
use crate::config::Config;
use crate::{BrainError, Result};

const TABLE_NAME: &str = "chunks";

/// Chunk persistence and retrieval over LanceDB.
///
/// The store owns the full lifecycle of persisted chunks: pages are always
/// replaced as a complete set and never partially updated.
pub struct ChunkStore {
    connection: Connection,
    table_name: String,
    dimension: usize,
    embedding_model: String,
}

/// Where a result batch carries its relevance score.
enum ScoreSource {
    /// `_distance` from ANN search; similarity is `1 - distance` for unit vectors.
    VectorDistance,
    /// `_score` from full-text search; higher is better, unbounded.
    TextScore,
}

impl ChunkStore {
    pub async fn new(config: &Config) -> Result<Self> {
        let db_path = config.vector_store_path();
        debug!("Initializing LanceDB at path: {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                BrainError::Store(format!("Failed to create vector store directory: {e}"))
            })?;
        }

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| BrainError::Store(format!("Failed to connect to LanceDB: {e}")))?;

        let store = Self {
            connection,
            table_name: TABLE_NAME.to_string(),
            dimension: config.embedding.dimension,
            embedding_model: config.embedding.model.clone(),
        };

        store.initialize_table().await?;

        info!("Chunk store initialized at {:?}", db_path);
        Ok(store)
    }

    async fn initialize_table(&self) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| BrainError::Store(format!("Failed to list tables: {e}")))?;

        if table_names.contains(&self.table_name) {
            debug!("Chunks table already exists");
            return Ok(());
        }

        info!(
            "Creating chunks table with {} dimensions",
            self.dimension
        );

        self.connection
            .create_empty_table(&self.table_name, self.schema())
            .execute()
            .await
            .map_err(|e| BrainError::Store(format!("Failed to create table: {e}")))?;

        Ok(())
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    self.dimension as i32,
                ),
                false,
            ),
            Field::new("page_id", DataType::Utf8, false),
            Field::new("database_id", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("page_url", DataType::Utf8, true),
            Field::new("properties", DataType::Utf8, false),
            Field::new("last_edited_time", DataType::Utf8, false),
            Field::new("stored_at", DataType::Utf8, false),
            Field::new("embedding_model", DataType::Utf8, false),
            Field::new("token_count", DataType::UInt32, false),
        ]))
    }

    /// Best-effort creation of the ANN and full-text indexes.
    ///
    /// Index provisioning is advisory: a missing index degrades search to a
    /// slower path (or to the lexical fallback), so failure here is logged and
    /// never aborts startup.
    pub async fn ensure_indexes(&self) {
        let table = match self.open_table().await {
            Ok(table) => table,
            Err(e) => {
                warn!("Skipping index check, table unavailable: {}", e);
                return;
            }
        };

        if let Err(e) = table
            .create_index(&["embedding"], Index::Auto)
            .execute()
            .await
        {
            warn!(
                "Vector index not created ({}); similarity search will scan the table",
                e
            );
        }

        if let Err(e) = table
            .create_index(&["content"], Index::FTS(FtsIndexBuilder::default()))
            .execute()
            .await
        {
            warn!(
                "Full-text index not created ({}); lexical fallback search may be unavailable",
                e
            );
        }
    }

    /// Look up the stored last-edited timestamp for a page, if any chunks exist.
    pub async fn find_existing(&self, page_id: &str) -> Result<Option<String>> {
        let table = self.open_table().await?;

        let mut stream = table
            .query()
            .only_if(format!("page_id = '{}'", escape(page_id)))
            .select(Select::Columns(vec!["last_edited_time".to_string()]))
            .limit(1)
            .execute()
            .await
            .map_err(|e| BrainError::Store(format!("Failed to query existing page: {e}")))?;

        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| BrainError::Store(format!("Failed to read query stream: {e}")))?
        {
            if batch.num_rows() > 0 {
                let column = string_column(&batch, "last_edited_time")?;
                return Ok(Some(column.value(0).to_string()));
            }
        }

        Ok(None)
    }

    /// Atomically replace the full chunk set for a page.
    ///
    /// Deletes every chunk for the page, then inserts the new set as one batch.
    /// If the insert fails the page is left with zero chunks and the error is
    /// returned so the caller can retry the whole page; stale and new chunks
    /// are never mixed.
    pub async fn replace_chunks(
        &self,
        meta: &PageMetadata,
        chunks: Vec<NewChunk>,
    ) -> Result<usize> {
        let table = self.open_table().await?;

        let predicate = format!("page_id = '{}'", escape(&meta.page_id));
        table
            .delete(&predicate)
            .await
            .map_err(|e| BrainError::Store(format!("Failed to delete existing chunks: {e}")))?;

        if chunks.is_empty() {
            debug!("No chunks to store for page {}", meta.page_id);
            return Ok(0);
        }

        let count = chunks.len();
        let batch = self.build_record_batch(meta, chunks)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        table.add(reader).execute().await.map_err(|e| {
            BrainError::Store(format!(
                "Failed to insert chunks for page {}: {e}",
                meta.page_id
            ))
        })?;

        debug!("Stored {} chunks for page {}", count, meta.page_id);
        Ok(count)
    }

    fn build_record_batch(
        &self,
        meta: &PageMetadata,
        chunks: Vec<NewChunk>,
    ) -> Result<RecordBatch> {
        let len = chunks.len();
        let stored_at = Utc::now().to_rfc3339();

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * self.dimension);
        let mut page_ids = Vec::with_capacity(len);
        let mut database_ids = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut page_urls = Vec::with_capacity(len);
        let mut properties = Vec::with_capacity(len);
        let mut last_edited_times = Vec::with_capacity(len);
        let mut stored_ats = Vec::with_capacity(len);
        let mut models = Vec::with_capacity(len);
        let mut token_counts = Vec::with_capacity(len);

        for chunk in &chunks {
            if chunk.embedding.len() != self.dimension {
                return Err(BrainError::Store(format!(
                    "Chunk embedding has {} dimensions, table expects {}",
                    chunk.embedding.len(),
                    self.dimension
                )));
            }

            ids.push(Uuid::new_v4().to_string());
            flat_values.extend_from_slice(&chunk.embedding);
            page_ids.push(meta.page_id.as_str());
            database_ids.push(meta.database_id.as_str());
            chunk_indices.push(chunk.chunk_index);
            contents.push(chunk.content.as_str());
            page_urls.push(meta.page_url.as_deref());
            properties.push(meta.properties_json.as_str());
            last_edited_times.push(meta.last_edited_time.as_str());
            stored_ats.push(stored_at.as_str());
            models.push(self.embedding_model.as_str());
            token_counts.push(chunk.token_count);
        }

        let values_array = Float32Array::from(flat_values);
        let item_field = Arc::new(Field::new("item", DataType::Float32, false));
        let embedding_array = FixedSizeListArray::try_new(
            item_field,
            self.dimension as i32,
            Arc::new(values_array),
            None,
        )
        .map_err(|e| BrainError::Store(format!("Failed to create embedding array: {e}")))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(embedding_array),
            Arc::new(StringArray::from(page_ids)),
            Arc::new(StringArray::from(database_ids)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(page_urls)),
            Arc::new(StringArray::from(properties)),
            Arc::new(StringArray::from(last_edited_times)),
            Arc::new(StringArray::from(stored_ats)),
            Arc::new(StringArray::from(models)),
            Arc::new(UInt32Array::from(token_counts)),
        ];

        RecordBatch::try_new(self.schema(), arrays)
            .map_err(|e| BrainError::Store(format!("Failed to create record batch: {e}")))
    }

    /// Approximate nearest-neighbor search over chunk embeddings.
    ///
    /// Results are filtered to `score >= min_score` and ordered by descending
    /// similarity, capped at `limit`.
    pub async fn vector_search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        debug!("Vector search with limit {} min_score {}", limit, min_score);

        let table = self.open_table().await?;

        let mut stream = table
            .vector_search(query_embedding)
            .map_err(|e| BrainError::Store(format!("Failed to build vector search: {e}")))?
            .column("embedding")
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| BrainError::Store(format!("Failed to execute vector search: {e}")))?;

        let mut results = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| BrainError::Store(format!("Failed to read search stream: {e}")))?
        {
            results.extend(parse_search_batch(&batch, &ScoreSource::VectorDistance)?);
        }

        results.retain(|r| r.score >= min_score);
        debug!("Vector search returned {} results", results.len());
        Ok(results)
    }

    /// Lexical relevance search over chunk text.
    ///
    /// Used when vector search is unavailable; same result shape, different
    /// score semantics.
    pub async fn fallback_text_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        debug!("Fallback text search for {:?}", query);

        let table = self.open_table().await?;

        let mut stream = table
            .query()
            .full_text_search(FullTextSearchQuery::new(query.to_string()))
            .limit(limit)
            .execute()
            .await
            .map_err(|e| BrainError::Store(format!("Failed to execute text search: {e}")))?;

        let mut results = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| BrainError::Store(format!("Failed to read search stream: {e}")))?
        {
            results.extend(parse_search_batch(&batch, &ScoreSource::TextScore)?);
        }

        debug!("Text search returned {} results", results.len());
        Ok(results)
    }

    /// Vector search with automatic degradation to lexical search.
    ///
    /// Callers get one result shape either way and never special-case the
    /// fallback path.
    pub async fn retrieve(
        &self,
        query_embedding: &[f32],
        query_text: &str,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        match self.vector_search(query_embedding, limit, min_score).await {
            Ok(results) => Ok(results),
            Err(e) => {
                warn!("Vector search failed ({}), falling back to text search", e);
                self.fallback_text_search(query_text, limit).await
            }
        }
    }

    pub async fn get_stats(&self) -> Result<StoreStats> {
        let table = self.open_table().await?;

        let total_chunks = table
            .count_rows(None)
            .await
            .map_err(|e| BrainError::Store(format!("Failed to count rows: {e}")))? as u64;

        let mut pages = HashSet::new();
        let mut databases = HashSet::new();

        let mut stream = table
            .query()
            .select(Select::Columns(vec![
                "page_id".to_string(),
                "database_id".to_string(),
            ]))
            .execute()
            .await
            .map_err(|e| BrainError::Store(format!("Failed to query chunk ids: {e}")))?;

        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| BrainError::Store(format!("Failed to read stats stream: {e}")))?
        {
            let page_ids = string_column(&batch, "page_id")?;
            let database_ids = string_column(&batch, "database_id")?;
            for row in 0..batch.num_rows() {
                pages.insert(page_ids.value(row).to_string());
                databases.insert(database_ids.value(row).to_string());
            }
        }

        Ok(StoreStats {
            total_chunks,
            unique_pages: pages.len() as u64,
            unique_databases: databases.len() as u64,
            storage_size_bytes: dir_size(&self.store_path()),
            embedding_model: self.embedding_model.clone(),
            embedding_dimension: self.dimension,
        })
    }

    /// Delete every chunk belonging to a page.
    pub async fn delete_page(&self, page_id: &str) -> Result<u64> {
        let table = self.open_table().await?;

        let predicate = format!("page_id = '{}'", escape(page_id));
        let deleted = table
            .count_rows(Some(predicate.clone()))
            .await
            .map_err(|e| BrainError::Store(format!("Failed to count page chunks: {e}")))?
            as u64;

        table
            .delete(&predicate)
            .await
            .map_err(|e| BrainError::Store(format!("Failed to delete page chunks: {e}")))?;

        info!("Deleted {} chunks for page {}", deleted, page_id);
        Ok(deleted)
    }

    async fn open_table(&self) -> Result<lancedb::Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| BrainError::Store(format!("Failed to open table: {e}")))
    }

    fn store_path(&self) -> std::path::PathBuf {
        let uri = self.connection.uri();
        std::path::PathBuf::from(uri.trim_start_matches("file://"))
    }
}

fn parse_search_batch(batch: &RecordBatch, score_source: &ScoreSource) -> Result<Vec<SearchResult>> {
    let ids = string_column(batch, "id")?;
    let page_ids = string_column(batch, "page_id")?;
    let database_ids = string_column(batch, "database_id")?;
    let contents = string_column(batch, "content")?;
    let page_urls = string_column(batch, "page_url")?;
    let properties = string_column(batch, "properties")?;
    let last_edited_times = string_column(batch, "last_edited_time")?;

    let chunk_indices = batch
        .column_by_name("chunk_index")
        .and_then(|col| col.as_any().downcast_ref::<UInt32Array>())
        .ok_or_else(|| BrainError::Store("Missing chunk_index column".to_string()))?;

    let score_column = match score_source {
        ScoreSource::VectorDistance => "_distance",
        ScoreSource::TextScore => "_score",
    };
    let scores = batch
        .column_by_name(score_column)
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let mut results = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let raw_score = scores.map_or(0.0, |s| if s.is_null(row) { 0.0 } else { s.value(row) });
        let score = match score_source {
            ScoreSource::VectorDistance => 1.0 - raw_score,
            ScoreSource::TextScore => raw_score,
        };

        results.push(SearchResult {
            chunk_id: ids.value(row).to_string(),
            page_id: page_ids.value(row).to_string(),
            database_id: database_ids.value(row).to_string(),
            chunk_index: chunk_indices.value(row),
            content: contents.value(row).to_string(),
            score,
            page_url: if page_urls.is_null(row) {
                None
            } else {
                Some(page_urls.value(row).to_string())
            },
            properties_json: properties.value(row).to_string(),
            last_edited_time: last_edited_times.value(row).to_string(),
        });
    }

    Ok(results)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| BrainError::Store(format!("Missing {name} column")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| BrainError::Store(format!("Invalid {name} column type")))
}

/// Escape a value for use inside a single-quoted SQL predicate.
fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

fn dir_size(path: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(path) else {
        return 0;
    };

    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                dir_size(&path)
            } else {
                entry.metadata().map(|m| m.len()).unwrap_or(0)
            }
        })
        .sum()
}
