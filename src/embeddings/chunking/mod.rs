
use tracing::debug;

use crate::config::ChunkingConfig;
use crate::{BrainError, Result};

/// Splits text into overlapping token windows sized for embedding.
///
/// The same tokenizer backs both segmentation and the token counts persisted on
/// stored chunks, so accounting stays consistent across the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| BrainError::Config(e.to_string()))?;
        Ok(Self { config })
    }

    /// Split `text` into chunks of at most `max_chunk_tokens` tokens, adjacent
    /// chunks sharing `chunk_overlap_tokens` tokens.
    ///
    /// Text that already fits in one window is returned verbatim; decoding it
    /// through the tokenizer would only risk disturbing whitespace.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let tokens = tokenize(text);

        if tokens.len() <= self.config.max_chunk_tokens {
            return vec![text.to_string()];
        }

        let step = self.config.max_chunk_tokens - self.config.chunk_overlap_tokens;
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < tokens.len() {
            let end = (start + self.config.max_chunk_tokens).min(tokens.len());
            chunks.push(decode(&tokens[start..end]).trim().to_string());

            if end >= tokens.len() {
                break;
            }
            start += step;
        }

        debug!(
            "Chunked {} tokens into {} chunks (window {}, overlap {})",
            tokens.len(),
            chunks.len(),
            self.config.max_chunk_tokens,
            self.config.chunk_overlap_tokens
        );

        chunks
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }
}

/// Tokenize `text` into spans of the original string.
///
/// A token is a word together with the whitespace run that follows it (leading
/// whitespace forms a token of its own), so concatenating the spans of any
/// contiguous token range reproduces that part of the input byte for byte.
/// Deterministic by construction.
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut token_start = 0;
    let mut prev_was_whitespace = false;

    for (idx, ch) in text.char_indices() {
        if prev_was_whitespace && !ch.is_whitespace() && idx > token_start {
            tokens.push(&text[token_start..idx]);
            token_start = idx;
        }
        prev_was_whitespace = ch.is_whitespace();
    }

    if token_start < text.len() {
        tokens.push(&text[token_start..]);
    }

    tokens
}

/// Number of tokens in `text` under the pipeline's tokenizer.
pub fn count_tokens(text: &str) -> usize {
    tokenize(text).len()
}

fn decode(tokens: &[&str]) -> String {
    tokens.concat()
}
