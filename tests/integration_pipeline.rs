#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

/// End-to-end pipeline tests: sync a mocked Notion database into a real
/// LanceDB store, then answer questions over it with a mocked model.
use notion_brain::config::{ChunkingConfig, Config, EmbeddingConfig, GeminiConfig, NotionConfig};
use notion_brain::embeddings::{Chunker, EmbeddingClient};
use notion_brain::ingest::SyncEngine;
use notion_brain::rag::{GeminiClient, RagEngine};
use notion_brain::source::NotionClient;
use notion_brain::store::ChunkStore;

use serde_json::json;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DIM: usize = 4;

fn test_config(base_dir: &std::path::Path) -> Config {
    Config {
        notion: NotionConfig {
            api_key: "notion-secret".to_string(),
            database_ids: vec!["db-1".to_string()],
            ..NotionConfig::default()
        },
        embedding: EmbeddingConfig {
            dimension: DIM,
            ..EmbeddingConfig::default()
        },
        gemini: GeminiConfig {
            api_key: "gemini-key".to_string(),
            ..GeminiConfig::default()
        },
        chunking: ChunkingConfig::default(),
        base_dir: base_dir.to_path_buf(),
    }
}

async fn sync_engine(config: &Config, notion: &MockServer, embed: &MockServer) -> SyncEngine {
    let source = NotionClient::new(&config.notion)
        .expect("should create client")
        .with_base_url(Url::parse(&notion.uri()).expect("mock uri"));
    let store = ChunkStore::new(config).await.expect("should create store");
    let embedder = EmbeddingClient::new(&config.embedding)
        .expect("should create embedder")
        .with_base_url(Url::parse(&embed.uri()).expect("mock uri"))
        .with_retry_attempts(1);
    let chunker = Chunker::new(config.chunking).expect("should create chunker");

    SyncEngine::new(source, store, embedder, chunker, config.notion.page_size)
}

async fn rag_engine(config: &Config, embed: &MockServer, gemini: &MockServer) -> RagEngine {
    let embedder = EmbeddingClient::new(&config.embedding)
        .expect("should create embedder")
        .with_base_url(Url::parse(&embed.uri()).expect("mock uri"))
        .with_retry_attempts(1);
    let store = ChunkStore::new(config).await.expect("should create store");
    let generator = GeminiClient::new(&config.gemini)
        .expect("should create generator")
        .with_base_url(Url::parse(&gemini.uri()).expect("mock uri"));

    RagEngine::new(
        embedder,
        store,
        generator,
        config.gemini.max_context_chunks,
        config.gemini.min_similarity_score,
    )
}

async fn mount_notion_database(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/databases/db-1/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "id": "page-1",
                "last_edited_time": "2024-05-01T09:00:00.000Z",
                "url": "https://notion.so/page-1",
                "properties": {
                    "Name": {
                        "type": "title",
                        "title": [{"plain_text": "Team Offsite Notes"}]
                    },
                    "Status": {
                        "type": "select",
                        "select": {"name": "Final"}
                    }
                }
            }],
            "has_more": false,
            "next_cursor": null
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/blocks/page-1/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"type": "heading_1", "heading_1": {"rich_text": [{"plain_text": "Decisions"}]}},
                {"type": "paragraph", "paragraph": {"rich_text": [
                    {"plain_text": "The offsite will be held in Lisbon in October."}
                ]}}
            ],
            "has_more": false,
            "next_cursor": null
        })))
        .mount(server)
        .await;
}

async fn mount_embedder(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"embedding": [1.0, 0.0, 0.0, 0.0]})),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn sync_then_ask_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(temp_dir.path());

    let notion = MockServer::start().await;
    let embed = MockServer::start().await;
    let gemini = MockServer::start().await;
    mount_notion_database(&notion).await;
    mount_embedder(&embed).await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "The offsite is in Lisbon."}]}}]
        })))
        .mount(&gemini)
        .await;

    let engine = sync_engine(&config, &notion, &embed).await;
    let report = engine
        .sync_database("db-1", false, None)
        .await
        .expect("should sync");
    assert_eq!(report.success, 1);
    assert_eq!(report.errors, 0);
    assert!(report.total_chunks >= 1);

    let rag = rag_engine(&config, &embed, &gemini).await;
    let answer = rag
        .answer("where is the offsite?")
        .await
        .expect("should answer");

    assert_eq!(answer.answer, "The offsite is in Lisbon.");
    assert!(answer.context_used);
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].page_id, "page-1");
    assert_eq!(
        answer.sources[0].title.as_deref(),
        Some("Team Offsite Notes")
    );
    assert_eq!(
        answer.sources[0].page_url.as_deref(),
        Some("https://notion.so/page-1")
    );
}

#[tokio::test]
async fn resync_is_idempotent_and_answers_survive() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(temp_dir.path());

    let notion = MockServer::start().await;
    let embed = MockServer::start().await;
    let gemini = MockServer::start().await;
    mount_notion_database(&notion).await;
    mount_embedder(&embed).await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "Lisbon."}]}}]
        })))
        .mount(&gemini)
        .await;

    let engine = sync_engine(&config, &notion, &embed).await;
    let first = engine
        .sync_database("db-1", false, None)
        .await
        .expect("should sync");
    let second = engine
        .sync_database("db-1", false, None)
        .await
        .expect("should sync");

    assert_eq!(first.success, 1);
    assert_eq!(second.success, 0);
    assert_eq!(second.skipped, 1);

    // The second pass must not have duplicated any chunks.
    let stats = engine.store().get_stats().await.expect("should get stats");
    assert_eq!(stats.total_chunks as usize, first.total_chunks);
    assert_eq!(stats.unique_pages, 1);

    let rag = rag_engine(&config, &embed, &gemini).await;
    let answer = rag.answer("where?").await.expect("should answer");
    assert_eq!(answer.answer, "Lisbon.");
}

#[tokio::test]
async fn deleting_a_page_removes_it_from_answers() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(temp_dir.path());

    let notion = MockServer::start().await;
    let embed = MockServer::start().await;
    let gemini = MockServer::start().await;
    mount_notion_database(&notion).await;
    mount_embedder(&embed).await;
    // Once the page is gone the model must not be consulted at all.
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "unused"}]}}]
        })))
        .expect(0)
        .mount(&gemini)
        .await;

    let engine = sync_engine(&config, &notion, &embed).await;
    engine
        .sync_database("db-1", false, None)
        .await
        .expect("should sync");

    let deleted = engine
        .store()
        .delete_page("page-1")
        .await
        .expect("should delete");
    assert!(deleted >= 1);

    let rag = rag_engine(&config, &embed, &gemini).await;
    let answer = rag.answer("where is the offsite?").await.expect("should answer");

    assert!(!answer.context_used);
    assert!(answer.sources.is_empty());
}
