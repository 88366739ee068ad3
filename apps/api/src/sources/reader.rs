//! Fetches web pages through the reader API and condenses them into prompt blocks.

use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
#[error("Failed to fetch content from {url}. The website may be blocking automated access.")]
pub struct FetchError {
    pub url: String,
    #[source]
    pub source: Option<reqwest::Error>,
}

/// Clean page content as returned by the reader API.
#[derive(Debug, Clone, PartialEq)]
pub struct WebsiteContent {
    pub title: String,
    pub description: String,
    pub content: String,
    pub url: String,
}

/// Fetches a URL as clean text. Swappable so the pipeline can run without network access.
#[async_trait]
pub trait PageReader: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<WebsiteContent, FetchError>;
}

#[derive(Debug, Deserialize)]
struct ReaderEnvelope {
    data: ReaderData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReaderData {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    content: Option<String>,
}

/// Client for the Jina-style reader API (`GET {base}/{url}`).
#[derive(Clone)]
pub struct ReaderClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ReaderClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn reader_url(&self, url: &str) -> String {
        format!("{}/{}", self.base_url, url)
    }
}

#[async_trait]
impl PageReader for ReaderClient {
    async fn fetch(&self, url: &str) -> Result<WebsiteContent, FetchError> {
        let fail = |source: Option<reqwest::Error>| FetchError {
            url: url.to_string(),
            source,
        };

        let mut request = self
            .client
            .get(self.reader_url(url))
            .header("Accept", "application/json");
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| fail(Some(e)))?;
        if !response.status().is_success() {
            warn!("Reader API returned {} for {url}", response.status());
            return Err(fail(None));
        }

        let envelope: ReaderEnvelope = response.json().await.map_err(|e| fail(Some(e)))?;
        debug!("Fetched {url} via reader API");
        Ok(envelope.data.into_content(url))
    }
}

impl ReaderData {
    fn into_content(self, requested_url: &str) -> WebsiteContent {
        WebsiteContent {
            title: self
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            description: self.description.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            url: self
                .url
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| requested_url.to_string()),
        }
    }
}

/// Fetches every URL concurrently and keeps the successes, in input order.
/// A failed URL is logged and omitted.
pub async fn fetch_many(reader: &dyn PageReader, urls: &[String]) -> Vec<WebsiteContent> {
    let results = join_all(urls.iter().map(|url| reader.fetch(url))).await;
    results
        .into_iter()
        .filter_map(|result| match result {
            Ok(content) => Some(content),
            Err(e) => {
                warn!("Skipping competitor site: {e}");
                None
            }
        })
        .collect()
}

/// Renders fetched content as a prompt block, truncated to `max_chars` characters.
pub fn summarize_website_content(content: &WebsiteContent, max_chars: usize) -> String {
    let body = truncate_chars(&content.content, max_chars);

    format!(
        "## Website: {}\nURL: {}\nDescription: {}\n\n### Content:\n{}",
        content.title, content.url, content.description, body
    )
    .trim()
    .to_string()
}

/// Keeps the first `max_chars` characters, appending `...` when anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
