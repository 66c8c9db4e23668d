use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use super::repository::DeliveryRepository;
use crate::error::StoreError;
use crate::models::{DedupKey, Listing};

/// Delivered `listing_id`s grouped by source, so lookups borrow instead of allocate.
type DeliveredCache = HashMap<String, HashSet<String>>;

/// Process-wide entry point to the delivery store.
#[derive(Clone)]
pub struct DedupStore {
    repository: Arc<dyn DeliveryRepository>,
}

impl DedupStore {
    pub fn new(repository: Arc<dyn DeliveryRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn DeliveryRepository> {
        &self.repository
    }

    /// Start a session for one tenant filter, loading everything it was already sent.
    ///
    /// A failed load is returned as [`StoreError::Unavailable`]; the caller
    /// must skip the hunt rather than treat the tenant as having no history.
    pub async fn open(&self, tenant_id: &str, filter_id: &str) -> Result<DedupSession, StoreError> {
        let keys = self
            .repository
            .delivered_keys(tenant_id, filter_id)
            .await
            .map_err(|e| StoreError::Unavailable {
                tenant_id: tenant_id.to_string(),
                filter_id: filter_id.to_string(),
                source: Box::new(e),
            })?;

        let loaded = keys.len();
        let mut delivered = DeliveredCache::new();
        for (listing_id, source) in keys {
            delivered.entry(source).or_default().insert(listing_id);
        }

        info!(tenant_id, filter_id, loaded, "opened delivery session");

        Ok(DedupSession {
            repository: self.repository.clone(),
            tenant_id: tenant_id.to_string(),
            filter_id: filter_id.to_string(),
            delivered: Mutex::new(delivered),
        })
    }
}

/// Delivery state of one tenant filter for the duration of one hunt.
pub struct DedupSession {
    repository: Arc<dyn DeliveryRepository>,
    tenant_id: String,
    filter_id: String,
    delivered: Mutex<DeliveredCache>,
}

impl DedupSession {
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn filter_id(&self) -> &str {
        &self.filter_id
    }

    /// In-memory membership check; never reaches the backing store.
    pub fn is_delivered(&self, listing_id: &str, source: &str) -> bool {
        self.cache()
            .get(source)
            .is_some_and(|ids| ids.contains(listing_id))
    }

    pub fn is_listing_delivered(&self, listing: &Listing) -> bool {
        self.is_delivered(&listing.id.as_key(), &listing.source)
    }

    /// Persist that the listing was observed. Existing records are left untouched.
    ///
    /// Failures are logged and swallowed.
    pub async fn record_seen(&self, listing: &Listing) {
        let key = listing.dedup_key(&self.tenant_id, &self.filter_id);
        let payload = match serde_json::to_value(listing) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(listing_id = %key.listing_id, source = %key.source, error = %e, "failed to snapshot listing");
                serde_json::Value::Null
            }
        };

        if let Err(e) = self.repository.insert_seen(&key, &payload).await {
            warn!(
                tenant_id = %self.tenant_id,
                filter_id = %self.filter_id,
                listing_id = %key.listing_id,
                source = %key.source,
                error = %e,
                "failed to record seen listing"
            );
        }
    }

    /// Mark the listing as delivered, in memory first and then in the store.
    ///
    /// The cache is updated even when the write fails so this cycle never
    /// notifies the same listing twice. A failed write is logged; the
    /// listing may then be sent again in a later cycle.
    pub async fn mark_delivered(&self, listing_id: &str, source: &str) {
        let newly_cached = self
            .cache()
            .entry(source.to_string())
            .or_default()
            .insert(listing_id.to_string());
        if !newly_cached {
            debug!(listing_id, source, "listing already marked delivered in this session");
        }

        let key = DedupKey::new(listing_id, source, &self.tenant_id, &self.filter_id);
        match self.repository.set_delivered(&key).await {
            Ok(true) => {}
            Ok(false) => warn!(
                tenant_id = %self.tenant_id,
                filter_id = %self.filter_id,
                listing_id,
                source,
                "no delivery record to mark, listing was never recorded as seen"
            ),
            Err(e) => warn!(
                tenant_id = %self.tenant_id,
                filter_id = %self.filter_id,
                listing_id,
                source,
                error = %e,
                "failed to mark listing delivered"
            ),
        }
    }

    /// Number of delivered keys currently cached.
    pub fn delivered_count(&self) -> usize {
        self.cache().values().map(HashSet::len).sum()
    }

    fn cache(&self) -> MutexGuard<'_, DeliveredCache> {
        self.delivered.lock().unwrap_or_else(|e| e.into_inner())
    }
}
