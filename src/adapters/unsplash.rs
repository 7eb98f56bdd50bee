//! [`ImageSearch`] backed by the Unsplash search API.

use crate::error::PortError;
use crate::ports::ImageSearch;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const UNSPLASH_API_URL: &str = "https://api.unsplash.com";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    urls: PhotoUrls,
}

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    regular: Option<String>,
}

pub struct UnsplashImageSearch {
    client: reqwest::Client,
    access_key: String,
    base_url: String,
}

impl UnsplashImageSearch {
    pub fn new(access_key: impl Into<String>, timeout_secs: u64) -> Result<Self, PortError> {
        Self::with_base_url(access_key, UNSPLASH_API_URL, timeout_secs)
    }

    /// Point at a different API host (a proxy or a local stub).
    pub fn with_base_url(
        access_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, PortError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PortError::Request(e.to_string()))?;
        Ok(Self {
            client,
            access_key: access_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ImageSearch for UnsplashImageSearch {
    async fn search(&self, query: &str) -> Result<Option<String>, PortError> {
        let url = format!("{}/search/photos", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("query", query), ("per_page", "1")])
            .header("Authorization", format!("Client-ID {}", self.access_key))
            .send()
            .await
            .map_err(|e| PortError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PortError::Request(format!(
                "photo search returned HTTP {}",
                response.status()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| PortError::InvalidResponse(e.to_string()))?;
        let found = first_photo(body);
        debug!("Photo search '{}': {}", query, found.as_deref().unwrap_or("no match"));
        Ok(found)
    }
}

fn first_photo(body: SearchResponse) -> Option<String> {
    body.results
        .into_iter()
        .next()
        .and_then(|p| p.urls.regular)
        .filter(|u| !u.trim().is_empty())
}

/// Image search for deployments without a photo provider: never finds anything.
pub struct DisabledImageSearch;

#[async_trait]
impl ImageSearch for DisabledImageSearch {
    async fn search(&self, _query: &str) -> Result<Option<String>, PortError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_regular_url() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"total":2,"results":[{"id":"a","urls":{"regular":"https://img.test/a","small":"x"}},
            {"id":"b","urls":{"regular":"https://img.test/b"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_photo(body).as_deref(), Some("https://img.test/a"));
    }

    #[test]
    fn empty_results_mean_no_photo() {
        let body: SearchResponse = serde_json::from_str(r#"{"total":0,"results":[]}"#).unwrap();
        assert_eq!(first_photo(body), None);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let s = UnsplashImageSearch::with_base_url("key", "http://localhost:9000/", 5).unwrap();
        assert_eq!(s.base_url, "http://localhost:9000");
    }

    #[tokio::test]
    async fn disabled_search_finds_nothing() {
        assert_eq!(DisabledImageSearch.search("Shiro").await.unwrap(), None);
    }
}
