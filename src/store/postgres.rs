use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;

use super::repository::DeliveryRepository;
use crate::error::StoreError;
use crate::models::{ActivitySummary, DedupKey};

/// Postgres-backed delivery records (`deliveries` table).
#[derive(Clone)]
pub struct PgDeliveryRepository {
    pool: PgPool,
}

impl PgDeliveryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool shared by the whole process.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await?;
        info!(max_connections, "connected to database");
        Ok(pool)
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[async_trait]
impl DeliveryRepository for PgDeliveryRepository {
    async fn delivered_keys(
        &self,
        tenant_id: &str,
        filter_id: &str,
    ) -> Result<Vec<(String, String)>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT listing_id, source FROM deliveries
             WHERE tenant_id = $1 AND filter_id = $2 AND delivered = TRUE",
        )
        .bind(tenant_id)
        .bind(filter_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn insert_seen(&self, key: &DedupKey, payload: &serde_json::Value) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO deliveries (listing_id, source, tenant_id, filter_id, delivered, payload)
             VALUES ($1, $2, $3, $4, FALSE, $5)
             ON CONFLICT (listing_id, source, tenant_id, filter_id) DO NOTHING",
        )
        .bind(&key.listing_id)
        .bind(&key.source)
        .bind(&key.tenant_id)
        .bind(&key.filter_id)
        .bind(Json(payload))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_delivered(&self, key: &DedupKey) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE deliveries SET delivered = TRUE, updated_at = NOW()
             WHERE listing_id = $1 AND source = $2 AND tenant_id = $3 AND filter_id = $4",
        )
        .bind(&key.listing_id)
        .bind(&key.source)
        .bind(&key.tenant_id)
        .bind(&key.filter_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn activity_since(&self, since: DateTime<Utc>) -> Result<ActivitySummary, StoreError> {
        let (new_listings, tenants) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*), COUNT(DISTINCT tenant_id) FROM deliveries WHERE created_at > $1",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(ActivitySummary { new_listings, tenants })
    }
}
