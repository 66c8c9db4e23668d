use serde::{Deserialize, Serialize};

use crate::error::TenantError;

/// Raw `filter_settings` row as read from the tenant store.
///
/// Every column is optional here: rows are validated one by one in the
/// scheduler so that a single incomplete subscription only skips itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenantRecord {
    pub filter_id: Option<String>,
    pub tenant_id: Option<String>,
    pub filter_url: Option<String>,
    pub receiver_ids: Option<Vec<String>>,
    pub is_paid: Option<bool>,
    pub scraping_interval: Option<i32>,
}

/// A complete, paid subscription: one tenant filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantFilter {
    pub tenant_id: String,
    pub filter_id: String,
    pub filter_urls: Vec<String>,
    pub receiver_ids: Vec<String>,
    pub is_paid: bool,
    /// Minimum minutes between two hunts of this filter
    pub scraping_interval: u32,
}

impl TenantFilter {
    pub const DEFAULT_SCRAPING_INTERVAL: u32 = 30;
}

impl TryFrom<TenantRecord> for TenantFilter {
    type Error = TenantError;

    fn try_from(record: TenantRecord) -> Result<Self, Self::Error> {
        let tenant_id = non_empty(record.tenant_id).ok_or(TenantError::MissingTenantId)?;
        let filter_id = non_empty(record.filter_id).ok_or_else(|| TenantError::MissingFilterId {
            tenant_id: tenant_id.clone(),
        })?;

        let receiver_ids: Vec<String> = record
            .receiver_ids
            .unwrap_or_default()
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        if receiver_ids.is_empty() {
            return Err(TenantError::MissingReceivers { tenant_id, filter_id });
        }

        // A filter may hold several search URLs separated by whitespace or commas.
        let filter_urls: Vec<String> = record
            .filter_url
            .unwrap_or_default()
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect();
        if filter_urls.is_empty() {
            return Err(TenantError::MissingFilterUrl { tenant_id, filter_id });
        }

        let scraping_interval = record
            .scraping_interval
            .and_then(|m| u32::try_from(m).ok())
            .filter(|m| *m > 0)
            .unwrap_or(Self::DEFAULT_SCRAPING_INTERVAL);

        Ok(Self {
            tenant_id,
            filter_id,
            filter_urls,
            receiver_ids,
            is_paid: record.is_paid.unwrap_or(false),
            scraping_interval,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
