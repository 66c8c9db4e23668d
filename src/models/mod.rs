mod delivery;
mod tenant;

pub use delivery::{ActivitySummary, DedupKey, DeliveryRecord};
pub use tenant::{TenantFilter, TenantRecord};

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source-native identifier of a listing, unique only within its source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListingId {
    Numeric(i64),
    Text(String),
}

impl ListingId {
    /// Canonical text form, used as the persisted dedup key component.
    pub fn as_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingId::Numeric(n) => write!(f, "{n}"),
            ListingId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ListingId {
    fn from(value: i64) -> Self {
        ListingId::Numeric(value)
    }
}

impl From<i32> for ListingId {
    fn from(value: i32) -> Self {
        ListingId::Numeric(i64::from(value))
    }
}

impl From<&str> for ListingId {
    fn from(value: &str) -> Self {
        ListingId::Text(value.to_string())
    }
}

impl From<String> for ListingId {
    fn from(value: String) -> Self {
        ListingId::Text(value)
    }
}

/// One observed listing ("expose") as normalized by a site adapter.
///
/// `(id, source)` identifies the listing at its source. Nothing in here
/// ties it to a tenant; that association only exists in the delivery store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    /// Name of the adapter that produced this listing
    pub source: String,
    pub title: String,
    pub price: Option<f64>,
    /// Living area in square meters
    pub size: Option<f64>,
    pub rooms: Option<f64>,
    pub address: String,
    pub url: String,
    pub image_url: Option<String>,
    pub details: Option<BTreeMap<String, String>>,
    pub durations: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl Listing {
    /// Create a listing with only its identity and title set.
    pub fn new(id: impl Into<ListingId>, source: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            title: title.into(),
            price: None,
            size: None,
            rooms: None,
            address: String::new(),
            url: String::new(),
            image_url: None,
            details: None,
            durations: None,
            scraped_at: Utc::now(),
        }
    }

    pub fn dedup_key(&self, tenant_id: &str, filter_id: &str) -> DedupKey {
        DedupKey::new(self.id.as_key(), &self.source, tenant_id, filter_id)
    }

    /// Whether the address still needs to be looked up on the detail page.
    pub fn needs_address(&self) -> bool {
        let address = self.address.trim();
        address.is_empty() || address.starts_with("http")
    }
}
