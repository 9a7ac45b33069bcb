use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::article::{Article, Category};

/// What the user sees whenever a fetch fails, whatever the cause
pub const FETCH_FAILED_MESSAGE: &str = "Error fetching news. Please try again later.";

const NEWS_PATH: &str = "/api/news";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid backend url: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Failed to fetch news (HTTP {0})")]
    HttpStatus(StatusCode),
    #[error("malformed news response: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    articles: Option<Vec<Article>>,
}

pub struct Fetcher {
    client: Client,
    endpoint: Url,
}

impl Fetcher {
    pub fn new(backend_url: &str) -> Result<Self, FetchError> {
        let endpoint = Url::parse(&format!(
            "{}{}",
            backend_url.trim().trim_end_matches('/'),
            NEWS_PATH
        ))?;

        let client = Client::builder()
            .user_agent("NewsDesk/1.0 (News Reader)")
            .build()?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Full request URL with both parameters percent-encoded
    pub fn request_url(&self, category: Category, query: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("category", category.as_str())
            .append_pair("q", query);
        url
    }

    /// One GET against the backend. No retry and no timeout.
    pub async fn fetch_news(
        &self,
        category: Category,
        query: &str,
    ) -> Result<Vec<Article>, FetchError> {
        let url = self.request_url(category, query);
        info!("Fetching news: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status));
        }

        let bytes = response.bytes().await?;
        let articles = Self::parse_articles(&bytes)?;

        info!("Received {} articles for '{}'", articles.len(), category);
        Ok(articles)
    }

    /// Decode a response body; a missing or null `articles` field is an empty list
    pub fn parse_articles(body: &[u8]) -> Result<Vec<Article>, FetchError> {
        let response: NewsResponse = serde_json::from_slice(body)?;
        Ok(response.articles.unwrap_or_default())
    }
}
