use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Uniqueness boundary for delivery tracking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey {
    pub listing_id: String,
    pub source: String,
    pub tenant_id: String,
    pub filter_id: String,
}

impl DedupKey {
    pub fn new(
        listing_id: impl Into<String>,
        source: impl Into<String>,
        tenant_id: impl Into<String>,
        filter_id: impl Into<String>,
    ) -> Self {
        Self {
            listing_id: listing_id.into(),
            source: source.into(),
            tenant_id: tenant_id.into(),
            filter_id: filter_id.into(),
        }
    }
}

/// Persisted fact that a listing was surfaced to a tenant under one filter.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeliveryRecord {
    pub listing_id: String,
    pub source: String,
    pub tenant_id: String,
    pub filter_id: String,
    pub delivered: bool,
    /// Listing snapshot taken when the record was first created
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Throughput over a trailing window, reported by the heartbeat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivitySummary {
    pub new_listings: i64,
    pub tenants: i64,
}
