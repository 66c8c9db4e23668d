use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::repository::DeliveryRepository;
use crate::error::StoreError;
use crate::models::{ActivitySummary, DedupKey, DeliveryRecord};

/// In-process delivery records, for offline runs and tests.
///
/// Read and write failures can be switched on to exercise the error paths
/// of the session.
#[derive(Default)]
pub struct MemoryDeliveryRepository {
    records: Mutex<HashMap<DedupKey, DeliveryRecord>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
}

impl MemoryDeliveryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of bulk reads served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn get(&self, key: &DedupKey) -> Option<DeliveryRecord> {
        self.lock().get(key).cloned()
    }

    pub fn records(&self) -> Vec<DeliveryRecord> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<DedupKey, DeliveryRecord>> {
        // A poisoned map is still structurally valid; keep serving it.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writes(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("write rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DeliveryRepository for MemoryDeliveryRepository {
    async fn delivered_keys(
        &self,
        tenant_id: &str,
        filter_id: &str,
    ) -> Result<Vec<(String, String)>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("read rejected".to_string()));
        }
        self.reads.fetch_add(1, Ordering::SeqCst);

        Ok(self
            .lock()
            .values()
            .filter(|r| r.delivered && r.tenant_id == tenant_id && r.filter_id == filter_id)
            .map(|r| (r.listing_id.clone(), r.source.clone()))
            .collect())
    }

    async fn insert_seen(&self, key: &DedupKey, payload: &serde_json::Value) -> Result<(), StoreError> {
        self.check_writes()?;
        let now = Utc::now();
        self.lock().entry(key.clone()).or_insert_with(|| DeliveryRecord {
            listing_id: key.listing_id.clone(),
            source: key.source.clone(),
            tenant_id: key.tenant_id.clone(),
            filter_id: key.filter_id.clone(),
            delivered: false,
            payload: payload.clone(),
            created_at: now,
            updated_at: now,
        });
        Ok(())
    }

    async fn set_delivered(&self, key: &DedupKey) -> Result<bool, StoreError> {
        self.check_writes()?;
        match self.lock().get_mut(key) {
            Some(record) => {
                record.delivered = true;
                record.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn activity_since(&self, since: DateTime<Utc>) -> Result<ActivitySummary, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("read rejected".to_string()));
        }
        let records = self.lock();
        let recent: Vec<&DeliveryRecord> = records.values().filter(|r| r.created_at > since).collect();
        let mut tenants: Vec<&str> = recent.iter().map(|r| r.tenant_id.as_str()).collect();
        tenants.sort_unstable();
        tenants.dedup();

        Ok(ActivitySummary {
            new_listings: recent.len() as i64,
            tenants: tenants.len() as i64,
        })
    }
}
