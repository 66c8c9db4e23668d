use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use super::traits::{PageFetcher, SiteAdapter};
use super::types::parse_amount;
use crate::models::Listing;

const BASE_URL: &str = "https://www.booli.se";

/// Booli listing cards, usually rendered through a headless browser
pub struct BooliAdapter {
    fetcher: Arc<dyn PageFetcher>,
}

impl BooliAdapter {
    pub const NAME: &'static str = "booli";

    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Parse one `a.object-card-link` card
    fn parse_card(card: ElementRef<'_>, selectors: &CardSelectors) -> Option<Listing> {
        let href = card.value().attr("href").unwrap_or("");
        // Decode HTML entities (&nbsp; -> space)
        let aria_label = card
            .value()
            .attr("aria-label")
            .unwrap_or("")
            .replace("&nbsp;", " ")
            .replace('\u{a0}', " ");

        debug!("Processing: {}", aria_label);

        let booli_id = href.trim_end_matches('/').rsplit('/').next().unwrap_or("").to_string();
        if booli_id.is_empty() {
            return None;
        }

        // aria-label: "2 rum lägenhet på Götgatan 120 Södermalm, Stockholms kommun"
        let rooms = aria_label
            .split("rum")
            .next()
            .and_then(|before| before.split_whitespace().last())
            .and_then(parse_amount);

        let address = aria_label
            .split_once("på ")
            .map(|(_, after)| after.split(',').next().unwrap_or(after).trim().to_string())
            .unwrap_or_default();

        let mut size = None;
        let mut monthly_fee = None;
        for li in card.select(&selectors.list_item) {
            if let Some(aria) = li.value().attr("aria-label") {
                let aria = aria.replace("&nbsp;", " ");
                if aria.contains("kvadratmeter") {
                    size = parse_amount(&aria);
                }
                if aria.contains("kr/mån") {
                    monthly_fee = Some(aria);
                }
            }
        }

        let price = card
            .select(&selectors.price)
            .next()
            .map(|el| el.text().collect::<String>())
            .and_then(|text| parse_amount(&text));

        let features: Vec<String> = card
            .select(&selectors.tag)
            .map(|tag| tag.text().collect::<String>().trim().to_string())
            .filter(|f| !f.is_empty() && f != "Snart till salu")
            .collect();

        let image_url = card
            .select(&selectors.image)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(str::to_string);

        // Only keep cards with minimum data
        if address.is_empty() || (price.is_none() && size.is_none()) {
            info!("Skipped card {}: address='{}', price={:?}, size={:?}", booli_id, address, price, size);
            return None;
        }

        let mut details = std::collections::BTreeMap::new();
        if !features.is_empty() {
            details.insert("features".to_string(), features.join(", "));
        }
        if let Some(fee) = monthly_fee {
            details.insert("monthly_fee".to_string(), fee);
        }

        let url = if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{BASE_URL}{href}")
        };

        Some(Listing {
            title: aria_label.split(',').next().unwrap_or(&aria_label).trim().to_string(),
            price,
            size,
            rooms,
            address,
            url,
            image_url,
            details: (!details.is_empty()).then_some(details),
            scraped_at: Utc::now(),
            ..Listing::new(booli_id, Self::NAME, "")
        })
    }
}

struct CardSelectors {
    card: Selector,
    list_item: Selector,
    price: Selector,
    tag: Selector,
    image: Selector,
}

impl CardSelectors {
    fn new() -> Result<Self> {
        let parse = |css: &str| Selector::parse(css).map_err(|e| anyhow!("invalid selector {css}: {e}"));
        Ok(Self {
            card: parse("a.object-card-link")?,
            list_item: parse("li")?,
            price: parse("span.object-card__price--logo")?,
            tag: parse("div.tag")?,
            image: parse("img")?,
        })
    }
}

#[async_trait]
impl SiteAdapter for BooliAdapter {
    fn source_name(&self) -> &'static str {
        Self::NAME
    }

    fn handles(&self, url: &str) -> bool {
        url.starts_with("https://www.booli.se") || url.starts_with("https://booli.se")
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        self.fetcher.fetch(url).await
    }

    fn extract(&self, raw: &str) -> Result<Vec<Listing>> {
        let selectors = CardSelectors::new()?;
        let document = Html::parse_document(raw);

        let listings: Vec<Listing> = document
            .select(&selectors.card)
            .filter_map(|card| Self::parse_card(card, &selectors))
            .collect();

        info!("Extracted {} listings from Booli page", listings.len());
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoFetch;

    #[async_trait]
    impl PageFetcher for NoFetch {
        async fn fetch(&self, _url: &str) -> Result<String> {
            Err(anyhow!("offline"))
        }
        fn name(&self) -> &'static str {
            "none"
        }
    }

    const PAGE: &str = r#"
        <html><body>
          <a class="object-card-link" href="/annons/4711"
             aria-label="2 rum lägenhet på Götgatan 120 Södermalm, Stockholms kommun">
            <img src="https://bcdn.se/4711.jpg">
            <span class="object-card__price--logo">5 195 000 kr</span>
            <ul>
              <li aria-label="70 kvadratmeter">70 m²</li>
              <li aria-label="3 449 kr/mån">3 449 kr/mån</li>
            </ul>
            <div class="tag">Balkong</div>
            <div class="tag">Snart till salu</div>
          </a>
          <a class="object-card-link" href="/annons/4712" aria-label="1 rum lägenhet"></a>
        </body></html>
    "#;

    #[test]
    fn extracts_listing_cards() {
        let adapter = BooliAdapter::new(Arc::new(NoFetch));
        let listings = adapter.extract(PAGE).unwrap();

        assert_eq!(listings.len(), 1);
        let listing = &listings[0];
        assert_eq!(listing.id.as_key(), "4711");
        assert_eq!(listing.source, "booli");
        assert_eq!(listing.address, "Götgatan 120 Södermalm");
        assert_eq!(listing.price, Some(5_195_000.0));
        assert_eq!(listing.size, Some(70.0));
        assert_eq!(listing.rooms, Some(2.0));
        assert_eq!(listing.url, "https://www.booli.se/annons/4711");
        assert_eq!(listing.image_url.as_deref(), Some("https://bcdn.se/4711.jpg"));
        let details = listing.details.as_ref().unwrap();
        assert_eq!(details["features"], "Balkong");
    }

    #[test]
    fn handles_only_booli_urls() {
        let adapter = BooliAdapter::new(Arc::new(NoFetch));
        assert!(adapter.handles("https://www.booli.se/sok/till-salu?areaIds=115341"));
        assert!(!adapter.handles("https://www.subito.it/annunci"));
    }
}
