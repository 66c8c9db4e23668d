//! Source of tenant subscriptions (`filter_settings`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use crate::error::StoreError;
use crate::models::TenantRecord;

#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Every paid subscription, unvalidated.
    async fn active_tenants(&self) -> Result<Vec<TenantRecord>, StoreError>;
}

#[derive(Clone)]
pub struct PgTenantStore {
    pool: PgPool,
}

impl PgTenantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn active_tenants(&self) -> Result<Vec<TenantRecord>, StoreError> {
        let rows = sqlx::query_as::<_, TenantRecord>(
            r#"
            SELECT id::text AS filter_id,
                   user_id::text AS tenant_id,
                   filter_url,
                   receiver_ids,
                   is_paid,
                   scraping_interval
            FROM filter_settings
            WHERE is_paid = $1
            ORDER BY user_id, id
            "#,
        )
        .bind(true)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "fetched tenant filters");
        Ok(rows)
    }
}

/// Fixed tenant list, for tests and single-tenant setups.
#[derive(Default)]
pub struct StaticTenantStore {
    records: Mutex<Vec<TenantRecord>>,
    fail: AtomicBool,
}

impl StaticTenantStore {
    pub fn new(records: Vec<TenantRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_records(&self, records: Vec<TenantRecord>) {
        *self.records.lock().unwrap_or_else(PoisonError::into_inner) = records;
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TenantStore for StaticTenantStore {
    async fn active_tenants(&self) -> Result<Vec<TenantRecord>, StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("tenant store offline".to_string()));
        }
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.is_paid.unwrap_or(false))
            .cloned()
            .collect())
    }
}
