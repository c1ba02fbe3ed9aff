// Store module
// LanceDB-backed persistence and retrieval for embedded page chunks

pub mod chunk_store;

use serde::{Deserialize, Serialize};

pub use chunk_store::ChunkStore;

/// Page-level metadata denormalized onto every chunk so search results can be
/// cited without a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMetadata {
    /// Identifier of the source page.
    pub page_id: String,
    /// Identifier of the Notion database the page belongs to.
    pub database_id: String,
    /// Public URL of the page, when the API provides one.
    pub page_url: Option<String>,
    /// The page's typed properties, serialized as JSON.
    pub properties_json: String,
    /// Last-edited timestamp reported by the source, used for staleness checks.
    pub last_edited_time: String,
}

/// A chunk ready for insertion. The store assigns the persistent id.
#[derive(Debug, Clone)]
pub struct NewChunk {
    /// Zero-based position of this chunk within its page.
    pub chunk_index: u32,
    pub content: String,
    pub embedding: Vec<f32>,
    pub token_count: u32,
}

/// Read projection of a stored chunk plus a relevance score.
///
/// Vector search and the lexical fallback both produce this shape; only the
/// score semantics differ.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk_id: String,
    pub page_id: String,
    pub database_id: String,
    pub chunk_index: u32,
    pub content: String,
    pub score: f32,
    pub page_url: Option<String>,
    pub properties_json: String,
    pub last_edited_time: String,
}

/// Aggregate statistics about the chunk store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreStats {
    pub total_chunks: u64,
    pub unique_pages: u64,
    pub unique_databases: u64,
    pub storage_size_bytes: u64,
    pub embedding_model: String,
    pub embedding_dimension: usize,
}
