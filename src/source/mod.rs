// Source module
// Typed Notion API access: database queries, block content, query filters

pub mod filter;
pub mod page;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::NotionConfig;
use crate::{BrainError, Result};

pub use page::{Block, Page, PropertyValue, extract_page_text};

const NOTION_API_BASE: &str = "https://api.notion.com";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const BLOCK_PAGE_SIZE: u32 = 100;

/// One page of results from a database query.
#[derive(Debug, Deserialize)]
pub struct QueryPage {
    pub results: Vec<Page>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Request body for a database query. Empty fields are omitted from the
/// payload entirely; Notion rejects explicit nulls.
///
/// `filter` and `sorts` take the objects produced by [`filter::build_filter`]
/// and [`filter::build_sort`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatabaseQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sorts: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct BlockChildrenPage {
    results: Vec<Block>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Authenticated client for the Notion REST API.
#[derive(Debug, Clone)]
pub struct NotionClient {
    base_url: Url,
    api_key: String,
    api_version: String,
    client: reqwest::Client,
}

impl NotionClient {
    pub fn new(config: &NotionConfig) -> Result<Self> {
        let base_url = Url::parse(NOTION_API_BASE)
            .map_err(|e| BrainError::Source(format!("Invalid API base URL: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| BrainError::Source(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Fetch one page of results from a database.
    pub async fn query_database(
        &self,
        database_id: &str,
        query: &DatabaseQuery,
    ) -> Result<QueryPage> {
        let url = self
            .base_url
            .join(&format!("/v1/databases/{database_id}/query"))
            .map_err(|e| BrainError::Source(format!("Failed to build query URL: {e}")))?;

        debug!(
            "Querying database {} (cursor: {:?})",
            database_id, query.start_cursor
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .header("Notion-Version", &self.api_version)
            .json(query)
            .send()
            .await
            .map_err(|e| BrainError::Source(format!("Database query failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrainError::Source(format!(
                "Database query returned HTTP {status}: {body}"
            )));
        }

        response
            .json::<QueryPage>()
            .await
            .map_err(|e| BrainError::Source(format!("Failed to parse query response: {e}")))
    }

    /// Fetch all child blocks of a page, following pagination to the end.
    pub async fn list_block_children(&self, block_id: &str) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut url = self
                .base_url
                .join(&format!("/v1/blocks/{block_id}/children"))
                .map_err(|e| BrainError::Source(format!("Failed to build blocks URL: {e}")))?;

            {
                let mut params = url.query_pairs_mut();
                params.append_pair("page_size", &BLOCK_PAGE_SIZE.to_string());
                if let Some(cursor) = &cursor {
                    params.append_pair("start_cursor", cursor);
                }
            }

            let response = self
                .client
                .get(url)
                .bearer_auth(&self.api_key)
                .header("Notion-Version", &self.api_version)
                .send()
                .await
                .map_err(|e| BrainError::Source(format!("Block fetch failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(BrainError::Source(format!(
                    "Block fetch returned HTTP {status}: {body}"
                )));
            }

            let page: BlockChildrenPage = response
                .json()
                .await
                .map_err(|e| BrainError::Source(format!("Failed to parse blocks response: {e}")))?;

            blocks.extend(page.results);

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        debug!("Fetched {} blocks for {}", blocks.len(), block_id);
        Ok(blocks)
    }

    /// Verify the API token by fetching the bot user.
    pub async fn health_check(&self) -> Result<()> {
        let url = self
            .base_url
            .join("/v1/users/me")
            .map_err(|e| BrainError::Source(format!("Failed to build ping URL: {e}")))?;

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .header("Notion-Version", &self.api_version)
            .send()
            .await
            .map_err(|e| BrainError::Source(format!("Notion API unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(BrainError::Source(format!(
                "Notion API ping failed: HTTP {}",
                response.status()
            )));
        }

        Ok(())
    }
}
