// RAG module
// Retrieval-augmented answering over the chunk store

pub mod gemini;


use serde::Serialize;
use tracing::{debug, info, warn};

use crate::Result;
use crate::embeddings::EmbeddingClient;
use crate::source::PropertyValue;
use crate::store::{ChunkStore, SearchResult};

pub use gemini::GeminiClient;

const SNIPPET_MAX_CHARS: usize = 200;

const NO_RESULTS_ANSWER: &str =
    "I couldn't find relevant information in your knowledge base to answer this question.";

/// A generated answer together with its supporting citations.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<Source>,
    /// Whether retrieved chunks were fed to the model.
    pub context_used: bool,
    pub search_result_count: usize,
    pub model_used: String,
}

/// Citation for one retrieved chunk.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Source {
    pub page_id: String,
    pub title: Option<String>,
    pub page_url: Option<String>,
    /// Chunk content truncated for display.
    pub snippet: String,
    pub score: f32,
}

/// What the user wants from a free-form message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Intent {
    Query,
    Sync,
    Unknown,
}

/// Answers questions by retrieving relevant chunks and delegating the final
/// wording to the generative model.
pub struct RagEngine {
    embedder: EmbeddingClient,
    store: ChunkStore,
    generator: GeminiClient,
    max_context_chunks: usize,
    min_similarity_score: f32,
}

impl RagEngine {
    pub fn new(
        embedder: EmbeddingClient,
        store: ChunkStore,
        generator: GeminiClient,
        max_context_chunks: usize,
        min_similarity_score: f32,
    ) -> Self {
        Self {
            embedder,
            store,
            generator,
            max_context_chunks,
            min_similarity_score,
        }
    }

    /// Answer a question from the knowledge base.
    ///
    /// When retrieval produces nothing the model is never invoked and a fixed
    /// no-results answer is returned. A generation failure is reported inside
    /// the answer text, with the retrieved sources intact, so the caller still
    /// sees what was found.
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        info!("Answering question (length: {})", question.len());

        let query_embedding = self.embedder.embed(question).await?;
        let results = self
            .store
            .retrieve(
                &query_embedding,
                question,
                self.max_context_chunks,
                self.min_similarity_score,
            )
            .await?;

        if results.is_empty() {
            debug!("No relevant chunks found, skipping generation");
            return Ok(Answer {
                answer: NO_RESULTS_ANSWER.to_string(),
                sources: Vec::new(),
                context_used: false,
                search_result_count: 0,
                model_used: self.generator.model().to_string(),
            });
        }

        let prompt = build_answer_prompt(question, &results);
        let answer = match self.generator.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Generation failed: {}", e);
                format!("I encountered an error while generating the answer: {e}")
            }
        };

        let search_result_count = results.len();
        let sources = results.iter().map(build_source).collect();

        Ok(Answer {
            answer,
            sources,
            context_used: true,
            search_result_count,
            model_used: self.generator.model().to_string(),
        })
    }

    /// Classify a free-form message as a question, a sync request, or neither.
    ///
    /// Classification failures degrade to [`Intent::Unknown`] rather than
    /// erroring; the caller can always fall back to asking.
    pub async fn identify_intent(&self, message: &str) -> Intent {
        let prompt = build_intent_prompt(message);

        match self.generator.generate(&prompt).await {
            Ok(text) => match text.trim().to_uppercase().as_str() {
                "QUERY" => Intent::Query,
                "SYNC" => Intent::Sync,
                other => {
                    debug!("Unrecognized intent label: {:?}", other);
                    Intent::Unknown
                }
            },
            Err(e) => {
                warn!("Intent classification failed: {}", e);
                Intent::Unknown
            }
        }
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }
}

/// Assemble the grounded answering prompt from retrieved chunks.
fn build_answer_prompt(question: &str, results: &[SearchResult]) -> String {
    let context = results
        .iter()
        .enumerate()
        .map(|(i, result)| format!("Context {}:\n{}", i + 1, result.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a helpful assistant answering questions using the user's \
         personal knowledge base.\n\
         Answer the question using the context below. If the context does not \
         contain the answer, say so instead of guessing. Cite source page \
         titles or URLs when they are available. If you add anything from \
         general knowledge, clearly mark it as such.\n\n\
         {context}\n\n\
         Question: {question}\n\n\
         Answer:"
    )
}

fn build_intent_prompt(message: &str) -> String {
    format!(
        "Classify the intent of the following message.\n\
         Respond with exactly one word: QUERY if the user is asking a \
         question, SYNC if the user wants to update or re-index their \
         knowledge base.\n\n\
         Message: {message}"
    )
}

fn build_source(result: &SearchResult) -> Source {
    Source {
        page_id: result.page_id.clone(),
        title: title_from_properties(&result.properties_json),
        page_url: result.page_url.clone(),
        snippet: snippet(&result.content),
        score: result.score,
    }
}

/// Title from the first title-typed property in a stored properties payload.
fn title_from_properties(properties_json: &str) -> Option<String> {
    let properties: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(properties_json).ok()?;

    properties.values().find_map(|raw| {
        let value: PropertyValue =
            serde_json::from_value(raw.clone()).unwrap_or(PropertyValue::Unrecognized);
        if value.is_title() { value.as_text() } else { None }
    })
}

/// Truncate chunk content for display, on a character boundary.
fn snippet(content: &str) -> String {
    if content.chars().count() <= SNIPPET_MAX_CHARS {
        return content.to_string();
    }

    let truncated: String = content.chars().take(SNIPPET_MAX_CHARS).collect();
    format!("{truncated}...")
}
