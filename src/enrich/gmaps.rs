use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{DurationSource, TravelMode};

const DISTANCE_MATRIX_URL: &str = "https://maps.googleapis.com/maps/api/distancematrix/json";

/// Google Maps Distance Matrix client
pub struct GoogleMapsDurations {
    client: Client,
    api_key: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    duration: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    text: String,
}

impl GoogleMapsDurations {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            url: DISTANCE_MATRIX_URL.to_string(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    fn first_duration(response: MatrixResponse) -> Result<String> {
        if response.status != "OK" {
            bail!("Distance Matrix request failed: {}", response.status);
        }
        let element = response
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.elements.into_iter().next())
            .context("Distance Matrix returned no elements")?;
        if element.status != "OK" {
            bail!("No route found: {}", element.status);
        }
        element
            .duration
            .map(|d| d.text)
            .context("Distance Matrix element has no duration")
    }
}

#[async_trait]
impl DurationSource for GoogleMapsDurations {
    async fn duration(&self, origin: &str, destination: &str, mode: TravelMode) -> Result<String> {
        debug!(origin, destination, mode = %mode, "querying distance matrix");

        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("origins", origin),
                ("destinations", destination),
                ("mode", mode.as_str()),
                ("departure_time", "now"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("Failed to reach Distance Matrix API")?
            .error_for_status()
            .context("Distance Matrix API returned error status")?;

        let body: MatrixResponse = response.json().await.context("Failed to decode Distance Matrix response")?;
        Self::first_duration(body)
    }
}
