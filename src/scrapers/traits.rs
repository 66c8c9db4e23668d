use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Listing;

/// Common trait for all property sites.
///
/// An adapter only translates one site's markup into [`Listing`]s; how the
/// raw page is obtained is delegated to a [`PageFetcher`].
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Name of the source, stored with every listing it produces
    fn source_name(&self) -> &'static str;

    /// Whether this adapter understands the given search URL
    fn handles(&self, url: &str) -> bool;

    /// Download the raw search result page
    async fn fetch(&self, url: &str) -> Result<String>;

    /// Parse listings out of a raw search result page
    fn extract(&self, raw: &str) -> Result<Vec<Listing>>;

    /// Fetch and parse one search URL.
    async fn crawl(&self, url: &str) -> Result<Vec<Listing>> {
        let raw = self.fetch(url).await?;
        self.extract(&raw)
    }

    /// Extra attributes from the listing's detail page, if the site has any.
    async fn fetch_details(&self, _listing: &Listing) -> Result<Option<BTreeMap<String, String>>> {
        Ok(None)
    }

    /// Full address from the listing's detail page, if the site hides it on search pages.
    async fn resolve_address(&self, _listing: &Listing) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Transport used by adapters to download a page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;

    fn name(&self) -> &'static str;
}
