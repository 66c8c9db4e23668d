use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::traits::{PageFetcher, SiteAdapter};
use super::types::parse_amount;
use crate::models::Listing;

const BASE_URL: &str = "https://www.idealista.com";

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css}: {e}"))
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Idealista search results (`article.item` cards)
pub struct IdealistaAdapter {
    fetcher: Arc<dyn PageFetcher>,
}

impl IdealistaAdapter {
    pub const NAME: &'static str = "idealista";

    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    fn parse_article(article: ElementRef<'_>) -> Result<Option<Listing>> {
        let Some(id) = article
            .value()
            .attr("data-element-id")
            .and_then(|id| id.trim().parse::<i64>().ok())
        else {
            return Ok(None);
        };

        let Some(link) = article.select(&selector("a.item-link")?).next() else {
            return Ok(None);
        };
        let title = text_of(link);
        let url = format!("{BASE_URL}{}", link.value().attr("href").unwrap_or(""));

        let image_url = article
            .select(&selector("picture.item-multimedia img")?)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(str::to_string);

        // Not every card carries all three detail spans
        let detail_items: Vec<String> = article.select(&selector("span.item-detail")?).map(text_of).collect();
        let rooms = detail_items.first().and_then(|t| parse_amount(t));
        let size = detail_items.get(1).and_then(|t| parse_amount(t));
        let floor = detail_items.get(2).cloned().unwrap_or_default();

        let price = article
            .select(&selector("span.item-price")?)
            .next()
            .map(text_of)
            .and_then(|t| parse_amount(t.split('/').next().unwrap_or("")));

        let display_title = if floor.is_empty() {
            title.clone()
        } else {
            format!("{title} - {floor}")
        };

        let mut listing = Listing::new(id, Self::NAME, display_title);
        listing.price = price;
        listing.size = size;
        listing.rooms = rooms;
        // Search cards only show the street in the title
        listing.address = title;
        listing.url = url;
        listing.image_url = image_url;
        Ok(Some(listing))
    }
}

#[async_trait]
impl SiteAdapter for IdealistaAdapter {
    fn source_name(&self) -> &'static str {
        Self::NAME
    }

    fn handles(&self, url: &str) -> bool {
        url.starts_with(BASE_URL)
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        self.fetcher.fetch(url).await
    }

    fn extract(&self, raw: &str) -> Result<Vec<Listing>> {
        let document = Html::parse_document(raw);
        let mut listings = Vec::new();
        for article in document.select(&selector("article.item")?) {
            if let Some(listing) = Self::parse_article(article)? {
                listings.push(listing);
            }
        }
        debug!("extracted {} idealista listings", listings.len());
        Ok(listings)
    }

    async fn fetch_details(&self, listing: &Listing) -> Result<Option<BTreeMap<String, String>>> {
        let raw = self
            .fetcher
            .fetch(&listing.url)
            .await
            .context("Failed to fetch idealista detail page")?;
        let document = Html::parse_document(&raw);

        let mut details = BTreeMap::new();
        for (idx, item) in document
            .select(&selector("div.details-property_features li")?)
            .map(text_of)
            .filter(|t| !t.is_empty())
            .enumerate()
        {
            match item.split_once(':') {
                Some((key, value)) => details.insert(key.trim().to_lowercase(), value.trim().to_string()),
                None => details.insert(format!("feature_{}", idx + 1), item),
            };
        }

        Ok((!details.is_empty()).then_some(details))
    }

    async fn resolve_address(&self, listing: &Listing) -> Result<Option<String>> {
        let raw = self
            .fetcher
            .fetch(&listing.url)
            .await
            .context("Failed to fetch idealista detail page")?;
        let document = Html::parse_document(&raw);

        let parts: Vec<String> = document
            .select(&selector("div#headerMap li.header-map-list")?)
            .map(text_of)
            .filter(|t| !t.is_empty())
            .collect();

        Ok((!parts.is_empty()).then(|| parts.join(", ")))
    }
}
