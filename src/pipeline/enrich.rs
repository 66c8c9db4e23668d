use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Stage, StageKind};
use crate::enrich::{DurationSource, DurationTarget};
use crate::models::Listing;
use crate::scrapers::AdapterRegistry;

/// Pulls detail-page attributes through the adapter that produced each listing.
pub struct CrawlDetails {
    adapters: AdapterRegistry,
}

impl CrawlDetails {
    pub fn new(adapters: AdapterRegistry) -> Self {
        Self { adapters }
    }
}

#[async_trait]
impl Stage for CrawlDetails {
    fn kind(&self) -> StageKind {
        StageKind::Enrich
    }

    fn name(&self) -> &'static str {
        "crawl-details"
    }

    async fn process(&self, mut listings: Vec<Listing>) -> Vec<Listing> {
        for listing in &mut listings {
            let Some(adapter) = self.adapters.get(&listing.source) else {
                continue;
            };
            match adapter.fetch_details(listing).await {
                Ok(Some(details)) => listing.details.get_or_insert_with(BTreeMap::new).extend(details),
                Ok(None) => {}
                Err(e) => warn!(listing_id = %listing.id, source = %listing.source, error = %e, "failed to crawl details"),
            }
        }
        listings
    }
}

/// Fills in addresses the search page left empty or linked away.
pub struct ResolveAddresses {
    adapters: AdapterRegistry,
}

impl ResolveAddresses {
    pub fn new(adapters: AdapterRegistry) -> Self {
        Self { adapters }
    }
}

#[async_trait]
impl Stage for ResolveAddresses {
    fn kind(&self) -> StageKind {
        StageKind::Enrich
    }

    fn name(&self) -> &'static str {
        "resolve-addresses"
    }

    async fn process(&self, mut listings: Vec<Listing>) -> Vec<Listing> {
        for listing in listings.iter_mut().filter(|l| l.needs_address()) {
            let Some(adapter) = self.adapters.get(&listing.source) else {
                continue;
            };
            match adapter.resolve_address(listing).await {
                Ok(Some(address)) => {
                    debug!(listing_id = %listing.id, %address, "resolved address");
                    listing.address = address;
                }
                Ok(None) => {}
                Err(e) => warn!(listing_id = %listing.id, source = %listing.source, error = %e, "failed to resolve address"),
            }
        }
        listings
    }
}

/// Adds commute times from each listing's address to the configured targets.
pub struct CalculateDurations {
    source: Arc<dyn DurationSource>,
    targets: Vec<DurationTarget>,
}

impl CalculateDurations {
    pub fn new(source: Arc<dyn DurationSource>, targets: Vec<DurationTarget>) -> Self {
        Self { source, targets }
    }

    async fn durations_for(&self, listing: &Listing) -> Option<String> {
        let mut lines = Vec::new();
        for target in &self.targets {
            for &mode in &target.modes {
                match self.source.duration(&listing.address, &target.destination, mode).await {
                    Ok(text) => lines.push(format!("> {} ({}): {}", target.name, mode, text)),
                    Err(e) => warn!(listing_id = %listing.id, target = %target.name, %mode, error = %e, "duration lookup failed"),
                }
            }
        }
        (!lines.is_empty()).then(|| lines.join("\n"))
    }
}

#[async_trait]
impl Stage for CalculateDurations {
    fn kind(&self) -> StageKind {
        StageKind::Enrich
    }

    fn name(&self) -> &'static str {
        "calculate-durations"
    }

    async fn process(&self, mut listings: Vec<Listing>) -> Vec<Listing> {
        if self.targets.is_empty() {
            return listings;
        }
        for listing in listings.iter_mut().filter(|l| !l.needs_address()) {
            if let Some(durations) = self.durations_for(listing).await {
                listing.durations = Some(durations);
            }
        }
        listings
    }
}
