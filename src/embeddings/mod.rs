// Embeddings module
// Token-aware chunking plus the HTTP client that turns text into vectors

pub mod chunking;
pub mod client;

pub use chunking::{Chunker, count_tokens, tokenize};
pub use client::EmbeddingClient;
