//! Operator-facing liveness and throughput reports.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::models::ActivitySummary;
use crate::notify::Notifier;
use crate::store::DeliveryRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatInterval {
    Hour,
    Day,
    Week,
}

impl HeartbeatInterval {
    pub fn as_duration(self) -> Duration {
        match self {
            HeartbeatInterval::Hour => Duration::from_secs(60 * 60),
            HeartbeatInterval::Day => Duration::from_secs(24 * 60 * 60),
            HeartbeatInterval::Week => Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

pub struct Heartbeat {
    interval: Duration,
    window_minutes: u32,
    notifier: Arc<dyn Notifier>,
    receiver: String,
    repository: Arc<dyn DeliveryRepository>,
    last_sent: Option<Instant>,
}

impl Heartbeat {
    pub fn new(
        interval: HeartbeatInterval,
        window_minutes: u32,
        notifier: Arc<dyn Notifier>,
        receiver: impl Into<String>,
        repository: Arc<dyn DeliveryRepository>,
    ) -> Self {
        Self {
            interval: interval.as_duration(),
            window_minutes,
            notifier,
            receiver: receiver.into(),
            repository,
            last_sent: None,
        }
    }

    fn is_due(&self, now: Instant) -> bool {
        self.last_sent
            .map_or(true, |last| now.duration_since(last) >= self.interval)
    }

    /// Send a report if the interval elapsed since the last one.
    /// Returns whether a message went out.
    pub async fn tick(&mut self) -> bool {
        let now = Instant::now();
        if !self.is_due(now) {
            return false;
        }
        // Counted as sent even on failure so a broken channel is not retried every cycle.
        self.last_sent = Some(now);
        self.send().await
    }

    async fn send(&self) -> bool {
        let since = Utc::now() - chrono::Duration::minutes(i64::from(self.window_minutes));
        let message = match self.repository.activity_since(since).await {
            Ok(summary) => self.format(summary),
            Err(e) => {
                warn!(error = %e, "failed to compute heartbeat stats");
                "Beep Boop. This is a heartbeat message. \
                 Your bot is searching actively for flats. (database query failed)"
                    .to_string()
            }
        };

        match self.notifier.send(&self.receiver, &message).await {
            Ok(()) => {
                info!("heartbeat sent");
                true
            }
            Err(e) => {
                error!(error = %e, "failed to send heartbeat message");
                false
            }
        }
    }

    fn format(&self, summary: ActivitySummary) -> String {
        format!(
            "Heartbeat check:\n\
             - Unique users with new listings in last {window} mins: {tenants}\n\
             - Total new listings in last {window} mins: {listings}",
            window = self.window_minutes,
            tenants = summary.tenants,
            listings = summary.new_listings,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifyError;
    use crate::models::{DedupKey, Listing};
    use crate::store::MemoryDeliveryRepository;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Outbox {
        fail: bool,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for Outbox {
        async fn send(&self, _receiver: &str, text: &str) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Config("offline".to_string()));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
        fn channel_name(&self) -> &str {
            "outbox"
        }
    }

    async fn repository_with_activity() -> Arc<MemoryDeliveryRepository> {
        let repo = Arc::new(MemoryDeliveryRepository::new());
        for (id, tenant) in [(1, "a"), (2, "a"), (3, "b")] {
            let listing = Listing::new(id, "site", "t");
            let key: DedupKey = listing.dedup_key(tenant, "f");
            repo.insert_seen(&key, &serde_json::json!({})).await.unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn reports_recent_activity_once_per_interval() {
        let outbox = Arc::new(Outbox::default());
        let mut heartbeat = Heartbeat::new(
            HeartbeatInterval::Hour,
            10,
            outbox.clone(),
            "admin",
            repository_with_activity().await,
        );

        assert!(heartbeat.tick().await);
        assert!(!heartbeat.tick().await);

        let sent = outbox.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("last 10 mins: 2"));
        assert!(sent[0].contains("Total new listings in last 10 mins: 3"));
    }

    #[tokio::test]
    async fn degraded_message_when_stats_fail() {
        let outbox = Arc::new(Outbox::default());
        let repo = Arc::new(MemoryDeliveryRepository::new());
        repo.set_fail_reads(true);
        let mut heartbeat = Heartbeat::new(HeartbeatInterval::Day, 10, outbox.clone(), "admin", repo);

        assert!(heartbeat.tick().await);
        assert!(outbox.sent.lock().unwrap()[0].contains("database query failed"));
    }

    #[tokio::test]
    async fn send_failure_is_swallowed() {
        let outbox = Arc::new(Outbox { fail: true, ..Outbox::default() });
        let mut heartbeat = Heartbeat::new(
            HeartbeatInterval::Week,
            10,
            outbox,
            "admin",
            Arc::new(MemoryDeliveryRepository::new()),
        );

        assert!(!heartbeat.tick().await);
    }
}
