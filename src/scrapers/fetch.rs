use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::traits::PageFetcher;

const OXYLABS_REALTIME_URL: &str = "https://realtime.oxylabs.io/v1/queries";

/// Plain HTTP GET with the shared client
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url}"))?;

        if !response.status().is_success() {
            warn!(url, status = %response.status(), "site returned error status");
            bail!("Failed to fetch {}: {}", url, response.status());
        }

        let html = response.text().await.context("Failed to read response body")?;
        debug!("Downloaded {} bytes of HTML", html.len());
        Ok(html)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Fetches through the Oxylabs realtime scraping API, for sites behind anti-bot walls
pub struct OxylabsFetcher {
    client: Client,
    user: String,
    password: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct OxylabsResponse {
    results: Vec<OxylabsResult>,
}

#[derive(Debug, Deserialize)]
struct OxylabsResult {
    content: String,
    status_code: u16,
}

impl OxylabsFetcher {
    pub fn new(client: Client, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            client,
            user: user.into(),
            password: password.into(),
            endpoint: OXYLABS_REALTIME_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl PageFetcher for OxylabsFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!("Fetching URL via Oxylabs: {}", url);

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.user, Some(&self.password))
            .json(&json!({ "url": url }))
            .send()
            .await
            .context("Failed to reach Oxylabs")?;

        if !response.status().is_success() {
            bail!("Oxylabs returned status {} for {}", response.status(), url);
        }

        let body: OxylabsResponse = response
            .json()
            .await
            .context("Failed to decode Oxylabs response")?;

        let result = body
            .results
            .into_iter()
            .next()
            .with_context(|| format!("Oxylabs returned no result for {url}"))?;

        // 405 still carries a usable page for some portals
        if result.status_code != 200 && result.status_code != 405 {
            warn!(url, status = result.status_code, "target site returned error status through proxy");
        }

        Ok(result.content)
    }

    fn name(&self) -> &'static str {
        "oxylabs"
    }
}
