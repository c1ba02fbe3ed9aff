use super::*;
use tempfile::TempDir;

fn valid_config(base_dir: PathBuf) -> Config {
    Config {
        notion: NotionConfig {
            api_key: "secret_test".to_string(),
            database_ids: vec!["db-one".to_string()],
            ..NotionConfig::default()
        },
        embedding: EmbeddingConfig::default(),
        gemini: GeminiConfig {
            api_key: "AIza-test".to_string(),
            ..GeminiConfig::default()
        },
        chunking: ChunkingConfig::default(),
        base_dir,
    }
}

#[test]
fn default_chunking_values() {
    let config = ChunkingConfig::default();
    assert_eq!(config.max_chunk_tokens, 500);
    assert_eq!(config.chunk_overlap_tokens, 50);
    assert!(config.validate().is_ok());
}

#[test]
fn overlap_must_be_smaller_than_window() {
    let config = ChunkingConfig {
        max_chunk_tokens: 100,
        chunk_overlap_tokens: 100,
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OverlapTooLarge(100, 100))
    ));

    let config = ChunkingConfig {
        max_chunk_tokens: 100,
        chunk_overlap_tokens: 150,
    };
    assert!(config.validate().is_err());
}

#[test]
fn missing_notion_api_key_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = valid_config(temp_dir.path().to_path_buf());
    config.notion.api_key = String::new();

    assert!(matches!(
        config.validate(),
        Err(ConfigError::MissingNotionApiKey)
    ));
}

#[test]
fn missing_database_ids_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = valid_config(temp_dir.path().to_path_buf());
    config.notion.database_ids = vec![String::new()];

    assert!(matches!(
        config.validate(),
        Err(ConfigError::MissingDatabaseIds)
    ));
}

#[test]
fn missing_gemini_api_key_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = valid_config(temp_dir.path().to_path_buf());
    config.gemini.api_key = "  ".to_string();

    assert!(matches!(
        config.validate(),
        Err(ConfigError::MissingGeminiApiKey)
    ));
}

#[test]
fn page_size_bounds() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = valid_config(temp_dir.path().to_path_buf());

    config.notion.page_size = 0;
    assert!(config.validate().is_err());

    config.notion.page_size = 101;
    assert!(config.validate().is_err());

    config.notion.page_size = 100;
    assert!(config.validate().is_ok());
}

#[test]
fn embedding_url_built_from_parts() {
    let config = EmbeddingConfig {
        protocol: "https".to_string(),
        host: "embeddings.internal".to_string(),
        port: 8443,
        ..EmbeddingConfig::default()
    };

    let url = config.base_url().expect("should build url");
    assert_eq!(url.as_str(), "https://embeddings.internal:8443/");
}

#[test]
fn invalid_protocol_rejected() {
    let config = EmbeddingConfig {
        protocol: "ftp".to_string(),
        ..EmbeddingConfig::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));
}

#[test]
fn min_score_out_of_range_rejected() {
    let config = GeminiConfig {
        api_key: "key".to_string(),
        min_similarity_score: 1.5,
        ..GeminiConfig::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidMinScore(_))
    ));
}

#[test]
fn save_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = valid_config(temp_dir.path().to_path_buf());

    config.save().expect("should save config");
    let loaded = Config::load(temp_dir.path()).expect("should load config");

    assert_eq!(loaded.notion, config.notion);
    assert_eq!(loaded.embedding, config.embedding);
    assert_eq!(loaded.gemini, config.gemini);
    assert_eq!(loaded.chunking, config.chunking);
    assert_eq!(loaded.base_dir, temp_dir.path());
}

#[test]
fn load_missing_file_fails() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn invalid_config_refuses_to_save() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = valid_config(temp_dir.path().to_path_buf());
    config.chunking.chunk_overlap_tokens = config.chunking.max_chunk_tokens;

    assert!(config.save().is_err());
}
