use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use super::traits::{PageFetcher, SiteAdapter};
use super::types::parse_amount;
use crate::models::{Listing, ListingId};

/// Subito search results, read from the embedded `__NEXT_DATA__` state
pub struct SubitoAdapter {
    fetcher: Arc<dyn PageFetcher>,
}

impl SubitoAdapter {
    pub const NAME: &'static str = "subito";

    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    fn feature(features: &Value, key: &str) -> Option<f64> {
        features
            .get(key)?
            .pointer("/values/0/key")?
            .as_str()
            .and_then(parse_amount)
    }

    fn parse_item(item: &Value) -> Option<Listing> {
        let urn = item.get("urn")?.as_str()?;
        let title = item.get("subject")?.as_str()?.to_string();

        // Wanted-ads ("cerco casa ...") get posted in the rental section too
        if title.to_lowercase().starts_with("cerco") {
            return None;
        }

        let id: String = urn.chars().filter(char::is_ascii_digit).collect();
        if id.is_empty() {
            return None;
        }

        let features = item.get("features").cloned().unwrap_or(Value::Null);
        let geo = item.get("geo").cloned().unwrap_or(Value::Null);
        let address = [
            geo.pointer("/town/value"),
            geo.pointer("/city/shortName"),
            geo.pointer("/region/value"),
        ]
        .into_iter()
        .map(|v| v.and_then(Value::as_str).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(", ");

        let image_url = item
            .pointer("/images/0/scale")
            .and_then(Value::as_array)
            .and_then(|scales| scales.last())
            .and_then(|scale| scale.get("secureuri"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let listing_id = match id.parse::<i64>() {
            Ok(n) => ListingId::Numeric(n),
            Err(_) => ListingId::Text(id),
        };
        let mut listing = Listing::new(listing_id, Self::NAME, title);
        listing.url = item
            .pointer("/urls/default")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        listing.price = Self::feature(&features, "/price");
        listing.rooms = Self::feature(&features, "/room");
        listing.size = Self::feature(&features, "/size");
        listing.address = address;
        listing.image_url = image_url;
        Some(listing)
    }
}

#[async_trait]
impl SiteAdapter for SubitoAdapter {
    fn source_name(&self) -> &'static str {
        Self::NAME
    }

    fn handles(&self, url: &str) -> bool {
        url.starts_with("https://www.subito.it")
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        self.fetcher.fetch(url).await
    }

    fn extract(&self, raw: &str) -> Result<Vec<Listing>> {
        let document = Html::parse_document(raw);
        let script_selector =
            Selector::parse("script#__NEXT_DATA__").map_err(|e| anyhow!("invalid selector: {e}"))?;

        let state_json = document
            .select(&script_selector)
            .next()
            .map(|s| s.text().collect::<String>())
            .context("Subito page has no __NEXT_DATA__ script")?;

        let state: Value = serde_json::from_str(state_json.trim()).context("Failed to parse Subito state")?;
        let rows = state
            .pointer("/props/state/items/list")
            .and_then(Value::as_array)
            .context("Subito state has no item list")?;

        let listings: Vec<Listing> = rows
            .iter()
            .filter_map(|row| row.get("item"))
            .filter_map(Self::parse_item)
            .collect();

        debug!("extracted {} subito listings", listings.len());
        Ok(listings)
    }
}
