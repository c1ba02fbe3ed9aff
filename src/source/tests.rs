use super::*;
use crate::config::NotionConfig;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(server_uri: &str) -> NotionClient {
    let config = NotionConfig {
        api_key: "secret-token".to_string(),
        database_ids: vec!["db-1".to_string()],
        ..NotionConfig::default()
    };
    NotionClient::new(&config)
        .expect("should create client")
        .with_base_url(Url::parse(server_uri).expect("mock server uri"))
}

fn page_json(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "last_edited_time": "2024-03-01T12:00:00.000Z",
        "url": format!("https://notion.so/{id}"),
        "properties": {
            "Name": {"type": "title", "title": [{"plain_text": id}]}
        }
    })
}

#[tokio::test]
async fn query_sends_auth_and_version_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/databases/db-1/query"))
        .and(header("Authorization", "Bearer secret-token"))
        .and(header("Notion-Version", "2022-06-28"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [page_json("page-1")],
            "has_more": false,
            "next_cursor": null
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let page = client
        .query_database("db-1", &DatabaseQuery::default())
        .await
        .expect("should query");

    assert_eq!(page.results.len(), 1);
    assert_eq!(page.results[0].id, "page-1");
    assert!(!page.has_more);
}

#[tokio::test]
async fn query_forwards_cursor_and_page_size() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/databases/db-1/query"))
        .and(body_partial_json(json!({
            "page_size": 2,
            "start_cursor": "cursor-a"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [page_json("page-3")],
            "has_more": true,
            "next_cursor": "cursor-b"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let query = DatabaseQuery {
        page_size: Some(2),
        start_cursor: Some("cursor-a".to_string()),
        ..DatabaseQuery::default()
    };
    let page = client
        .query_database("db-1", &query)
        .await
        .expect("should query");

    assert!(page.has_more);
    assert_eq!(page.next_cursor.as_deref(), Some("cursor-b"));
}

#[tokio::test]
async fn query_serializes_filter_and_sorts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/databases/db-1/query"))
        .and(body_partial_json(json!({
            "filter": {"property": "Status", "rich_text": {"equals": "Done"}},
            "sorts": [{"property": "Created", "direction": "descending"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [],
            "has_more": false,
            "next_cursor": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let query = DatabaseQuery {
        filter: Some(filter::build_filter(
            "Status",
            &filter::FilterCondition::Equals("Done".to_string()),
        )),
        sorts: vec![filter::build_sort(
            "Created",
            filter::SortDirection::Descending,
        )],
        ..DatabaseQuery::default()
    };

    client
        .query_database("db-1", &query)
        .await
        .expect("should query");
}

#[tokio::test]
async fn query_error_includes_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/databases/db-1/query"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "invalid token"})),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let error = client
        .query_database("db-1", &DatabaseQuery::default())
        .await
        .expect_err("should fail");

    let message = error.to_string();
    assert!(message.contains("401"), "unexpected error: {message}");
    assert!(message.contains("invalid token"), "unexpected error: {message}");
}

#[tokio::test]
async fn block_listing_follows_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/blocks/page-1/children"))
        .and(query_param("start_cursor", "cursor-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"type": "paragraph", "paragraph": {"rich_text": [{"plain_text": "second"}]}}
            ],
            "has_more": false,
            "next_cursor": null
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/blocks/page-1/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"type": "paragraph", "paragraph": {"rich_text": [{"plain_text": "first"}]}}
            ],
            "has_more": true,
            "next_cursor": "cursor-a"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let blocks = client
        .list_block_children("page-1")
        .await
        .expect("should list blocks");

    let texts: Vec<String> = blocks.iter().filter_map(Block::plain_text).collect();
    assert_eq!(texts, vec!["first", "second"]);
}

#[tokio::test]
async fn health_check_hits_users_me() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/me"))
        .and(header("Authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "bot"})))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    assert!(client.health_check().await.is_ok());
}
