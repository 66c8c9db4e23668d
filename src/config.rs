//! Shared configuration: a YAML file, `.env` and environment overrides.
//!
//! One [`Config`] is loaded per process and never mutated afterwards.
//! Each tenant gets its own [`HuntConfig`] derived from it.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::enrich::DurationTarget;
use crate::error::ConfigError;
use crate::heartbeat::HeartbeatInterval;
use crate::models::TenantFilter;
use crate::notify::MessageRenderer;
use crate::pipeline::PredicateFilter;
use crate::scrapers::SearchCriteria;

pub const TELEGRAM: &str = "telegram";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "loop")]
    pub run_loop: LoopConfig,
    pub notifiers: Vec<String>,
    pub telegram: TelegramConfig,
    pub telegram_admin: Option<AdminConfig>,
    /// Message template, see [`MessageRenderer`]
    pub message: Option<String>,
    pub database: DatabaseConfig,
    /// Enabled adapter names; empty enables every registered adapter
    pub adapters: Vec<String>,
    /// Search URLs; replaced per tenant
    pub urls: Vec<String>,
    pub filters: SearchCriteria,
    pub crawl_details: bool,
    pub resolve_addresses: bool,
    pub google_maps_api: GoogleMapsConfig,
    pub durations: Vec<DurationTarget>,
    pub oxylabs: Option<OxylabsConfig>,
    pub use_proxy: bool,
    pub heartbeat: HeartbeatConfig,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run_loop: LoopConfig::default(),
            notifiers: vec![TELEGRAM.to_string()],
            telegram: TelegramConfig::default(),
            telegram_admin: None,
            message: None,
            database: DatabaseConfig::default(),
            adapters: Vec::new(),
            urls: Vec::new(),
            filters: SearchCriteria::default(),
            crawl_details: false,
            resolve_addresses: false,
            google_maps_api: GoogleMapsConfig::default(),
            durations: Vec::new(),
            oxylabs: None,
            use_proxy: false,
            heartbeat: HeartbeatConfig::default(),
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub active: bool,
    /// Seconds to sleep between cycles
    pub sleeping_time: u64,
    /// Seconds to pause between two tenants
    pub tenant_pause: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            active: true,
            sleeping_time: 600,
            tenant_pause: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub receiver_ids: Vec<String>,
    pub ask_ai_button: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            receiver_ids: Vec::new(),
            ask_ai_button: true,
        }
    }
}

/// Operator channel for heartbeats.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub bot_token: Option<String>,
    pub receiver_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GoogleMapsConfig {
    pub enable: bool,
    pub key: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OxylabsConfig {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub interval: Option<HeartbeatInterval>,
    /// Trailing window the activity stats cover
    pub window_minutes: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: None,
            window_minutes: 10,
        }
    }
}

/// Configuration of one hunt: the shared settings with the tenant's own
/// search URLs and receivers.
#[derive(Debug, Clone)]
pub struct HuntConfig {
    pub tenant_id: String,
    pub filter_id: String,
    pub config: Config,
}

impl HuntConfig {
    pub fn urls(&self) -> &[String] {
        &self.config.urls
    }

    pub fn receivers(&self) -> &[String] {
        &self.config.telegram.receiver_ids
    }
}

impl Config {
    /// Read and parse a YAML config file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let mut config = Self::from_yaml(&raw)?;
        config.apply_env(|key| std::env::var(key).ok());
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        // An empty file is a valid, all-defaults config.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Override secrets and connection strings from the environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(token) = lookup("TELEGRAM_ADMIN_BOT_TOKEN") {
            self.telegram_admin.get_or_insert_with(AdminConfig::default).bot_token = Some(token);
        }

        let user = lookup("OXYLABS_USER");
        let password = lookup("OXYLABS_PASSWORD");
        if user.is_some() || password.is_some() {
            let oxylabs = self.oxylabs.get_or_insert_with(OxylabsConfig::default);
            if let Some(user) = user {
                oxylabs.user = user;
            }
            if let Some(password) = password {
                oxylabs.password = password;
            }
        }
    }

    pub fn telegram_enabled(&self) -> bool {
        self.notifiers.iter().any(|n| n == TELEGRAM)
    }

    pub fn renderer(&self) -> MessageRenderer {
        self.message
            .as_deref()
            .map(MessageRenderer::new)
            .unwrap_or_default()
    }

    pub fn database_url(&self) -> Option<&str> {
        self.database.url.as_deref().filter(|u| !u.trim().is_empty())
    }

    /// Google Maps key, when duration lookups are switched on.
    pub fn google_maps_key(&self) -> Option<&str> {
        if !self.google_maps_api.enable || self.durations.is_empty() {
            return None;
        }
        self.google_maps_api.key.as_deref().filter(|k| !k.is_empty())
    }

    /// Checks that must pass before the loop starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram_enabled() && self.telegram.bot_token.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Invalid(
                "telegram notifier enabled but telegram.bot_token is not set".to_string(),
            ));
        }
        if self.database_url().is_none() {
            return Err(ConfigError::Invalid(
                "no database url: set database.url or DATABASE_URL".to_string(),
            ));
        }
        self.renderer()
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("message template: {e}")))?;
        PredicateFilter::from_criteria(&self.filters)
            .map_err(|e| ConfigError::Invalid(format!("filters.excluded_titles: {e}")))?;
        if self.google_maps_api.enable && self.google_maps_key().is_none() && !self.durations.is_empty() {
            return Err(ConfigError::Invalid(
                "google_maps_api enabled without a key".to_string(),
            ));
        }
        Ok(())
    }

    /// Hunt configuration for one tenant filter. The shared config is left untouched.
    pub fn for_tenant(&self, tenant: &TenantFilter) -> HuntConfig {
        let mut config = self.clone();
        config.urls = tenant.filter_urls.clone();
        config.telegram.receiver_ids = tenant.receiver_ids.clone();

        HuntConfig {
            tenant_id: tenant.tenant_id.clone(),
            filter_id: tenant.filter_id.clone(),
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
loop:
  active: true
  sleeping_time: 120
notifiers: [telegram]
telegram:
  bot_token: "123:abc"
  receiver_ids: ["1"]
database:
  url: postgres://localhost/hunter
urls:
  - https://www.subito.it/annunci-lombardia/affitto/appartamenti/
filters:
  max_price: 1200
  excluded_titles: [garage]
durations:
  - name: Office
    destination: Piazza Duomo, Milano
    modes: [transit, bicycling]
heartbeat:
  interval: day
"#;

    fn tenant() -> TenantFilter {
        TenantFilter {
            tenant_id: "t1".to_string(),
            filter_id: "f1".to_string(),
            filter_urls: vec!["https://www.idealista.it/affitto-case/milano/".to_string()],
            receiver_ids: vec!["42".to_string(), "43".to_string()],
            is_paid: true,
            scraping_interval: 30,
        }
    }

    #[test]
    fn parses_sample_with_defaults() {
        let config = Config::from_yaml(SAMPLE).unwrap();

        assert_eq!(config.run_loop.sleeping_time, 120);
        assert_eq!(config.run_loop.tenant_pause, 5);
        assert_eq!(config.filters.max_price, Some(1200.0));
        assert_eq!(config.durations[0].modes.len(), 2);
        assert_eq!(config.heartbeat.interval, Some(HeartbeatInterval::Day));
        assert_eq!(config.heartbeat.window_minutes, 10);
        assert!(config.telegram.ask_ai_button);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_file_is_default() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config.run_loop.sleeping_time, 600);
        assert!(config.telegram_enabled());
    }

    #[test]
    fn for_tenant_replaces_urls_and_receivers_only() {
        let shared = Config::from_yaml(SAMPLE).unwrap();
        let hunt = shared.for_tenant(&tenant());

        assert_eq!(hunt.tenant_id, "t1");
        assert_eq!(hunt.urls(), ["https://www.idealista.it/affitto-case/milano/"]);
        assert_eq!(hunt.receivers(), ["42", "43"]);
        assert_eq!(hunt.config.filters.max_price, Some(1200.0));

        assert_eq!(shared.urls.len(), 1);
        assert!(shared.urls[0].contains("subito"));
        assert_eq!(shared.telegram.receiver_ids, vec!["1".to_string()]);
    }

    #[test]
    fn env_overrides_secrets() {
        let mut config = Config::from_yaml(SAMPLE).unwrap();
        config.apply_env(|key| match key {
            "DATABASE_URL" => Some("postgres://db/other".to_string()),
            "TELEGRAM_ADMIN_BOT_TOKEN" => Some("admin".to_string()),
            "OXYLABS_USER" => Some("proxy-user".to_string()),
            _ => None,
        });

        assert_eq!(config.database_url(), Some("postgres://db/other"));
        assert_eq!(
            config.telegram_admin.and_then(|a| a.bot_token).as_deref(),
            Some("admin")
        );
        let oxylabs = config.oxylabs.unwrap();
        assert_eq!(oxylabs.user, "proxy-user");
        assert_eq!(oxylabs.password, "");
    }

    #[test]
    fn validation_catches_missing_token_database_and_bad_template() {
        assert!(Config::from_yaml(SAMPLE).unwrap().validate().is_ok());

        let mut config = Config::from_yaml(SAMPLE).unwrap();
        config.telegram.bot_token = None;
        assert!(config.validate().is_err());

        let mut config = Config::from_yaml(SAMPLE).unwrap();
        config.database.url = None;
        assert!(config.validate().is_err());

        let mut config = Config::from_yaml(SAMPLE).unwrap();
        config.message = Some("{{ title ".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::from_yaml(SAMPLE).unwrap();
        config.filters.excluded_titles = vec!["(unclosed".to_string()];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
