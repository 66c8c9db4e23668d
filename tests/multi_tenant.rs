use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use housing_hunter::config::{Config, LoopConfig};
use housing_hunter::error::NotifyError;
use housing_hunter::models::{Listing, TenantRecord};
use housing_hunter::notify::Notifier;
use housing_hunter::scrapers::{AdapterRegistry, SiteAdapter};
use housing_hunter::store::{DedupStore, MemoryDeliveryRepository};
use housing_hunter::tenants::StaticTenantStore;
use housing_hunter::{Hunter, Scheduler, ShutdownSignal};

struct Site {
    name: &'static str,
    ids: Vec<i64>,
    fails: bool,
}

#[async_trait]
impl SiteAdapter for Site {
    fn source_name(&self) -> &'static str {
        self.name
    }

    fn handles(&self, url: &str) -> bool {
        url.starts_with("https://listings.test/")
    }

    async fn fetch(&self, _url: &str) -> Result<String> {
        if self.fails {
            return Err(anyhow!("connection reset"));
        }
        Ok(String::new())
    }

    fn extract(&self, _raw: &str) -> Result<Vec<Listing>> {
        Ok(self
            .ids
            .iter()
            .map(|&id| Listing::new(id, self.name, format!("{} #{id}", self.name)))
            .collect())
    }
}

#[derive(Default)]
struct Inbox {
    sent: Mutex<Vec<(String, String)>>,
}

impl Inbox {
    fn for_receiver(&self, receiver: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| r == receiver)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for Inbox {
    async fn send(&self, receiver: &str, text: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((receiver.to_string(), text.to_string()));
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "inbox"
    }
}

fn tenant(id: &str, receivers: &[&str]) -> TenantRecord {
    TenantRecord {
        filter_id: Some(format!("{id}-1")),
        tenant_id: Some(id.to_string()),
        filter_url: Some(format!("https://listings.test/{id}")),
        receiver_ids: Some(receivers.iter().map(|r| r.to_string()).collect()),
        is_paid: Some(true),
        scraping_interval: None,
    }
}

fn scheduler(tenants: Vec<TenantRecord>, adapters: AdapterRegistry, inbox: Arc<Inbox>) -> Scheduler {
    let config = Config {
        run_loop: LoopConfig {
            active: false,
            sleeping_time: 0,
            tenant_pause: 0,
        },
        message: Some("{{ title }}".to_string()),
        ..Config::default()
    };
    let hunter = Hunter::new(
        DedupStore::new(Arc::new(MemoryDeliveryRepository::new())),
        adapters,
        vec![inbox as Arc<dyn Notifier>],
    );
    Scheduler::new(
        Arc::new(config),
        Arc::new(StaticTenantStore::new(tenants)),
        hunter,
        ShutdownSignal::new(),
    )
}

#[tokio::test]
async fn malformed_tenant_is_skipped_without_affecting_others() {
    let inbox = Arc::new(Inbox::default());
    let adapters = AdapterRegistry::new().with(Arc::new(Site { name: "site", ids: vec![1, 2], fails: false }));
    let mut scheduler = scheduler(
        vec![tenant("a", &["chat-a"]), tenant("b", &[]), tenant("c", &["chat-c"])],
        adapters,
        inbox.clone(),
    );

    let report = scheduler.run_cycle().await;

    assert_eq!(report.invalid, 1);
    assert_eq!(report.hunted, 2);
    assert_eq!(inbox.for_receiver("chat-a"), vec!["site #1", "site #2"]);
    assert_eq!(inbox.for_receiver("chat-c"), vec!["site #1", "site #2"]);
    assert_eq!(inbox.sent.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn failing_adapter_does_not_block_the_other() {
    let inbox = Arc::new(Inbox::default());
    let adapters = AdapterRegistry::new()
        .with(Arc::new(Site { name: "alpha", ids: vec![1], fails: true }))
        .with(Arc::new(Site { name: "beta", ids: vec![5, 6], fails: false }));
    let mut scheduler = scheduler(vec![tenant("a", &["chat-a"])], adapters, inbox.clone());

    let report = scheduler.run_cycle().await;

    assert_eq!(report.hunted, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.delivered, 2);
    assert_eq!(inbox.for_receiver("chat-a"), vec!["beta #5", "beta #6"]);
}

#[tokio::test]
async fn every_adapter_failing_is_an_empty_hunt() {
    let inbox = Arc::new(Inbox::default());
    let adapters = AdapterRegistry::new().with(Arc::new(Site { name: "alpha", ids: vec![1], fails: true }));
    let mut scheduler = scheduler(vec![tenant("a", &["chat-a"])], adapters, inbox.clone());

    let report = scheduler.run_cycle().await;

    assert_eq!(report.hunted, 1);
    assert_eq!(report.delivered, 0);
    assert!(inbox.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn run_once_completes_a_single_cycle() {
    let inbox = Arc::new(Inbox::default());
    let adapters = AdapterRegistry::new().with(Arc::new(Site { name: "site", ids: vec![1], fails: false }));
    let mut scheduler = scheduler(vec![tenant("a", &["chat-a"])], adapters, inbox.clone());

    scheduler.run(true).await;

    assert_eq!(inbox.for_receiver("chat-a"), vec!["site #1"]);
}
