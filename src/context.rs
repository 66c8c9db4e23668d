//! Process-scoped wiring: everything built once from the loaded config and
//! handed to the scheduler.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{info, warn};

use crate::config::Config;
use crate::enrich::GoogleMapsDurations;
use crate::heartbeat::{Heartbeat, HeartbeatInterval};
use crate::hunter::Hunter;
use crate::notify::{Notifier, TelegramNotifier};
use crate::scrapers::{
    AdapterRegistry, BooliAdapter, BrowserFetcher, HttpFetcher, IdealistaAdapter, OxylabsFetcher, PageFetcher,
    SubitoAdapter,
};
use crate::store::{DedupStore, DeliveryRepository};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub struct AppContext {
    pub config: Arc<Config>,
    pub client: Client,
    pub repository: Arc<dyn DeliveryRepository>,
    pub hunter: Hunter,
}

impl AppContext {
    pub fn new(config: Config, repository: Arc<dyn DeliveryRepository>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        let adapters = build_adapters(&config, &client);
        info!(adapters = ?adapters.names(), "registered adapters");

        let notifiers = build_notifiers(&config, &client)?;
        let mut hunter = Hunter::new(DedupStore::new(repository.clone()), adapters, notifiers);

        if let Some(key) = config.google_maps_key() {
            let mut source = GoogleMapsDurations::new(client.clone(), key);
            if let Some(url) = &config.google_maps_api.url {
                source = source.with_url(url.clone());
            }
            hunter = hunter.with_durations(Arc::new(source));
        }

        Ok(Self {
            config: Arc::new(config),
            client,
            repository,
            hunter,
        })
    }

    /// The operator heartbeat, if an interval and an admin channel are configured.
    pub fn heartbeat(&self, interval_override: Option<HeartbeatInterval>) -> Result<Option<Heartbeat>> {
        let Some(interval) = interval_override.or(self.config.heartbeat.interval) else {
            return Ok(None);
        };

        let admin = self.config.telegram_admin.as_ref();
        let (Some(token), Some(receiver)) = (
            admin.and_then(|a| a.bot_token.clone()).filter(|t| !t.trim().is_empty()),
            admin.and_then(|a| a.receiver_id.clone()).filter(|r| !r.trim().is_empty()),
        ) else {
            warn!("heartbeat requested but telegram_admin is not configured, disabling it");
            return Ok(None);
        };

        let notifier = TelegramNotifier::new(self.client.clone(), token).context("Invalid admin bot token")?;
        Ok(Some(Heartbeat::new(
            interval,
            self.config.heartbeat.window_minutes,
            Arc::new(notifier),
            receiver,
            self.repository.clone(),
        )))
    }
}

fn adapter_enabled(config: &Config, name: &str) -> bool {
    config.adapters.is_empty() || config.adapters.iter().any(|a| a == name)
}

fn build_adapters(config: &Config, client: &Client) -> AdapterRegistry {
    let http: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(client.clone()));

    let proxied: Arc<dyn PageFetcher> = match (&config.oxylabs, config.use_proxy) {
        (Some(oxylabs), true) => Arc::new(OxylabsFetcher::new(
            client.clone(),
            oxylabs.user.clone(),
            oxylabs.password.clone(),
        )),
        (None, true) => {
            warn!("use_proxy is set but oxylabs credentials are missing, fetching directly");
            http.clone()
        }
        _ => http.clone(),
    };

    let mut registry = AdapterRegistry::new()
        .with(Arc::new(IdealistaAdapter::new(proxied)))
        .with(Arc::new(SubitoAdapter::new(http.clone())));

    if adapter_enabled(config, BooliAdapter::NAME) {
        let fetcher: Arc<dyn PageFetcher> = match BrowserFetcher::new() {
            Ok(browser) => Arc::new(browser),
            Err(e) => {
                warn!(error = %e, "headless Chrome unavailable, Booli falls back to plain HTTP");
                http
            }
        };
        registry.register(Arc::new(BooliAdapter::new(fetcher)));
    }

    registry
}

fn build_notifiers(config: &Config, client: &Client) -> Result<Vec<Arc<dyn Notifier>>> {
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();

    for name in &config.notifiers {
        match name.as_str() {
            crate::config::TELEGRAM => {
                let token = config.telegram.bot_token.clone().unwrap_or_default();
                let telegram = TelegramNotifier::new(client.clone(), token)
                    .context("Invalid telegram configuration")?
                    .with_ask_ai_button(config.telegram.ask_ai_button);
                notifiers.push(Arc::new(telegram));
            }
            other => warn!(notifier = other, "unsupported notifier, ignoring"),
        }
    }

    Ok(notifiers)
}
