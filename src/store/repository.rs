use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{ActivitySummary, DedupKey};

/// Backing persistence for delivery records.
///
/// Writes are upserts: neither method may fail merely because a row
/// already exists or is missing.
#[async_trait]
pub trait DeliveryRepository: Send + Sync {
    /// `(listing_id, source)` of every delivered record for one tenant filter.
    async fn delivered_keys(
        &self,
        tenant_id: &str,
        filter_id: &str,
    ) -> Result<Vec<(String, String)>, StoreError>;

    /// Insert a record with `delivered = false`; no-op when the key exists.
    async fn insert_seen(&self, key: &DedupKey, payload: &serde_json::Value) -> Result<(), StoreError>;

    /// Flip an existing record to `delivered = true`.
    ///
    /// Returns whether a row was updated.
    async fn set_delivered(&self, key: &DedupKey) -> Result<bool, StoreError>;

    /// Records created after `since`, and how many distinct tenants they belong to.
    async fn activity_since(&self, since: DateTime<Utc>) -> Result<ActivitySummary, StoreError>;
}
