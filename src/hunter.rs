//! One tenant filter's hunt: crawl every URL with every matching adapter,
//! then push the merged result through a freshly built pipeline.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::HuntConfig;
use crate::enrich::DurationSource;
use crate::models::Listing;
use crate::notify::Notifier;
use crate::pipeline::{
    AlreadySeenFilter, CalculateDurations, CrawlDetails, MarkDelivered, Pipeline, PredicateFilter,
    ResolveAddresses, SaveAllListings, SendMessages,
};
use crate::scrapers::AdapterRegistry;
use crate::store::{DedupSession, DedupStore};

/// Everything a hunt needs that outlives a single cycle.
#[derive(Clone)]
pub struct Hunter {
    store: DedupStore,
    adapters: AdapterRegistry,
    notifiers: Vec<Arc<dyn Notifier>>,
    durations: Option<Arc<dyn DurationSource>>,
}

impl Hunter {
    pub fn new(store: DedupStore, adapters: AdapterRegistry, notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self {
            store,
            adapters,
            notifiers,
            durations: None,
        }
    }

    pub fn with_durations(mut self, source: Arc<dyn DurationSource>) -> Self {
        self.durations = Some(source);
        self
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    /// Run one hunt and return the listings delivered by it.
    ///
    /// Fails only when the delivery session cannot be opened or the pipeline
    /// cannot be built. Adapter failures shrink the crawl instead.
    pub async fn hunt(&self, config: &HuntConfig) -> Result<Vec<Listing>> {
        let adapters = self.adapters.enabled(&config.config.adapters);
        let session = Arc::new(
            self.store
                .open(&config.tenant_id, &config.filter_id)
                .await
                .context("cannot start hunt")?,
        );

        let crawled = self.crawl(&adapters, config.urls()).await;
        info!(
            tenant_id = %config.tenant_id,
            filter_id = %config.filter_id,
            crawled = crawled.len(),
            "crawl finished"
        );

        let pipeline = self.pipeline(config, session, adapters)?;
        debug!(stages = ?pipeline.stage_names(), "pipeline assembled");

        Ok(pipeline.run(crawled).await)
    }

    async fn crawl(&self, adapters: &AdapterRegistry, urls: &[String]) -> Vec<Listing> {
        let mut listings = Vec::new();
        for url in urls {
            let mut matched = false;
            for adapter in adapters.for_url(url) {
                matched = true;
                match adapter.crawl(url).await {
                    Ok(found) => {
                        debug!(source = adapter.source_name(), url = %url, count = found.len(), "crawled");
                        listings.extend(found);
                    }
                    Err(e) => {
                        warn!(source = adapter.source_name(), url = %url, error = %e, "crawl failed");
                    }
                }
            }
            if !matched {
                warn!(url = %url, "no enabled adapter handles this url");
            }
        }
        listings
    }

    fn pipeline(&self, config: &HuntConfig, session: Arc<DedupSession>, adapters: AdapterRegistry) -> Result<Pipeline> {
        let shared = &config.config;
        let mut builder = Pipeline::builder().filter_already_seen(AlreadySeenFilter::new(session.clone()));

        let predicates = PredicateFilter::from_criteria(&shared.filters).context("invalid excluded title pattern")?;
        if !predicates.is_empty() {
            builder = builder.apply_filter(predicates);
        }

        builder = builder.save_all_listings(SaveAllListings::new(session.clone()));

        if shared.crawl_details {
            builder = builder.crawl_details(CrawlDetails::new(adapters.clone()));
        }
        if shared.resolve_addresses {
            builder = builder.resolve_addresses(ResolveAddresses::new(adapters));
        }
        if let Some(source) = &self.durations {
            if !shared.durations.is_empty() {
                builder = builder.calculate_durations(CalculateDurations::new(source.clone(), shared.durations.clone()));
            }
        }

        let pipeline = builder
            .send_messages(SendMessages::new(
                shared.renderer(),
                self.notifiers.clone(),
                config.receivers().to_vec(),
            ))
            .mark_as_delivered(MarkDelivered::new(session))
            .build()?;
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::NotifyError;
    use crate::models::TenantFilter;
    use crate::scrapers::SiteAdapter;
    use crate::store::MemoryDeliveryRepository;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeSite {
        name: &'static str,
        ids: Vec<i64>,
        broken: bool,
    }

    #[async_trait]
    impl SiteAdapter for FakeSite {
        fn source_name(&self) -> &'static str {
            self.name
        }
        fn handles(&self, url: &str) -> bool {
            url.contains("example")
        }
        async fn fetch(&self, _url: &str) -> Result<String> {
            if self.broken {
                return Err(anyhow!("blocked by captcha"));
            }
            Ok(String::new())
        }
        fn extract(&self, _raw: &str) -> Result<Vec<Listing>> {
            Ok(self
                .ids
                .iter()
                .map(|&id| {
                    let mut listing = Listing::new(id, self.name, format!("Flat {id}"));
                    listing.price = Some(1000.0 + id as f64);
                    listing
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct Inbox {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for Inbox {
        async fn send(&self, receiver: &str, text: &str) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(format!("{receiver}:{text}"));
            Ok(())
        }
        fn channel_name(&self) -> &str {
            "inbox"
        }
    }

    fn hunt_config(config: &Config) -> HuntConfig {
        config.for_tenant(&TenantFilter {
            tenant_id: "t".to_string(),
            filter_id: "f".to_string(),
            filter_urls: vec!["https://example.org/search".to_string()],
            receiver_ids: vec!["r".to_string()],
            is_paid: true,
            scraping_interval: 30,
        })
    }

    fn config() -> Config {
        Config {
            message: Some("{{ title }}".to_string()),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn surviving_adapter_still_notifies() {
        let inbox = Arc::new(Inbox::default());
        let adapters = AdapterRegistry::new()
            .with(Arc::new(FakeSite { name: "good", ids: vec![1, 2], broken: false }))
            .with(Arc::new(FakeSite { name: "bad", ids: vec![3], broken: true }));
        let hunter = Hunter::new(
            DedupStore::new(Arc::new(MemoryDeliveryRepository::new())),
            adapters,
            vec![inbox.clone() as Arc<dyn Notifier>],
        );

        let delivered = hunter.hunt(&hunt_config(&config())).await.unwrap();

        assert_eq!(delivered.len(), 2);
        assert!(delivered.iter().all(|l| l.source == "good"));
        assert_eq!(inbox.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn second_hunt_delivers_nothing_new() {
        let inbox = Arc::new(Inbox::default());
        let hunter = Hunter::new(
            DedupStore::new(Arc::new(MemoryDeliveryRepository::new())),
            AdapterRegistry::new().with(Arc::new(FakeSite { name: "good", ids: vec![1, 2], broken: false })),
            vec![inbox.clone() as Arc<dyn Notifier>],
        );
        let config = config();

        assert_eq!(hunter.hunt(&hunt_config(&config)).await.unwrap().len(), 2);
        assert!(hunter.hunt(&hunt_config(&config)).await.unwrap().is_empty());
        assert_eq!(inbox.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn criteria_filter_before_delivery() {
        let inbox = Arc::new(Inbox::default());
        let repo = Arc::new(MemoryDeliveryRepository::new());
        let hunter = Hunter::new(
            DedupStore::new(repo.clone()),
            AdapterRegistry::new().with(Arc::new(FakeSite { name: "good", ids: vec![1, 500], broken: false })),
            vec![inbox.clone() as Arc<dyn Notifier>],
        );
        let mut config = config();
        config.filters.max_price = Some(1100.0);

        let delivered = hunter.hunt(&hunt_config(&config)).await.unwrap();

        assert_eq!(delivered.len(), 1);
        assert_eq!(repo.records().len(), 1);
    }

    #[tokio::test]
    async fn unavailable_store_fails_the_hunt() {
        let repo = Arc::new(MemoryDeliveryRepository::new());
        repo.set_fail_reads(true);
        let inbox = Arc::new(Inbox::default());
        let hunter = Hunter::new(
            DedupStore::new(repo),
            AdapterRegistry::new().with(Arc::new(FakeSite { name: "good", ids: vec![1], broken: false })),
            vec![inbox.clone() as Arc<dyn Notifier>],
        );

        assert!(hunter.hunt(&hunt_config(&config())).await.is_err());
        assert!(inbox.sent.lock().unwrap().is_empty());
    }
}
