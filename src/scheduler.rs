//! The top-level loop: fetch tenants, hunt each one, sleep, repeat.
//!
//! ```text
//!   ┌────────────────┐   store down / empty   ┌───────┐
//!   │ fetch-tenants  │───────────────────────►│ sleep │
//!   └──────┬─────────┘                        └───┬───┘
//!          │ one at a time                        │ heartbeat
//!          ▼                                      │
//!   ┌────────────────┐     all tenants done       │
//!   │ per-tenant hunt│────────────────────────────┘
//!   └────────────────┘
//! ```
//!
//! A tenant's failure (invalid record, unavailable store, panic) is logged
//! and the loop moves on to the next tenant.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::heartbeat::Heartbeat;
use crate::hunter::Hunter;
use crate::models::{TenantFilter, TenantRecord};
use crate::tenants::TenantStore;

/// Process-wide stop flag, set from the signal handler.
#[derive(Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Sleep for `duration` unless shutdown is requested first.
    /// Returns `true` if the sleep was interrupted.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let mut rx = self.rx.clone();
        if *rx.borrow_and_update() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            changed = rx.wait_for(|stop| *stop) => changed.is_ok(),
        }
    }
}

/// Counters for one pass over the tenant list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub tenants: usize,
    pub hunted: usize,
    /// Hunted less than their scraping interval ago
    pub skipped: usize,
    /// Incomplete tenant records
    pub invalid: usize,
    pub failed: usize,
    pub delivered: usize,
    /// The tenant list could not be read
    pub tenant_store_failed: bool,
}

pub struct Scheduler {
    config: Arc<Config>,
    tenants: Arc<dyn TenantStore>,
    hunter: Hunter,
    heartbeat: Option<Heartbeat>,
    shutdown: ShutdownSignal,
    last_hunted: HashMap<(String, String), Instant>,
    cycle: u64,
}

impl Scheduler {
    pub fn new(config: Arc<Config>, tenants: Arc<dyn TenantStore>, hunter: Hunter, shutdown: ShutdownSignal) -> Self {
        Self {
            config,
            tenants,
            hunter,
            heartbeat: None,
            shutdown,
            last_hunted: HashMap::new(),
            cycle: 0,
        }
    }

    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    /// Loop until shutdown. With `once`, stop after the first cycle.
    pub async fn run(&mut self, once: bool) {
        let sleeping_time = Duration::from_secs(self.config.run_loop.sleeping_time);
        info!(sleeping_time = ?sleeping_time, once, "scheduler started");

        while !self.shutdown.is_triggered() {
            let report = self.run_cycle().await;
            info!(
                cycle = report.cycle,
                tenants = report.tenants,
                hunted = report.hunted,
                skipped = report.skipped,
                invalid = report.invalid,
                failed = report.failed,
                delivered = report.delivered,
                "cycle finished"
            );

            if let Some(heartbeat) = self.heartbeat.as_mut() {
                heartbeat.tick().await;
            }

            if once {
                break;
            }

            debug!(sleeping_time = ?sleeping_time, "sleeping");
            if self.shutdown.sleep(sleeping_time).await {
                break;
            }
        }

        info!(cycles = self.cycle, "scheduler stopped");
    }

    /// One pass over every active tenant filter.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycle += 1;
        let mut report = CycleReport {
            cycle: self.cycle,
            ..CycleReport::default()
        };

        let records = match self.tenants.active_tenants().await {
            Ok(records) => records,
            Err(e) => {
                error!(cycle = self.cycle, error = %e, "failed to fetch tenants, skipping cycle");
                report.tenant_store_failed = true;
                return report;
            }
        };

        report.tenants = records.len();
        self.forget_departed(&records);
        if records.is_empty() {
            warn!(cycle = self.cycle, "no active tenants");
            return report;
        }

        let pause = Duration::from_secs(self.config.run_loop.tenant_pause);
        let mut first = true;

        for record in records {
            if self.shutdown.is_triggered() {
                info!("shutdown requested, leaving cycle early");
                break;
            }

            let tenant = match TenantFilter::try_from(record) {
                Ok(tenant) => tenant,
                Err(e) => {
                    warn!(error = %e, "skipping incomplete tenant filter");
                    report.invalid += 1;
                    continue;
                }
            };

            if !tenant.is_paid {
                debug!(tenant_id = %tenant.tenant_id, "skipping unpaid tenant filter");
                report.skipped += 1;
                continue;
            }

            let key = (tenant.tenant_id.clone(), tenant.filter_id.clone());
            if !self.interval_elapsed(&key, tenant.scraping_interval) {
                debug!(tenant_id = %tenant.tenant_id, filter_id = %tenant.filter_id, "scraping interval not elapsed");
                report.skipped += 1;
                continue;
            }

            if !first && self.shutdown.sleep(pause).await {
                break;
            }
            first = false;

            match self.hunt_tenant(&tenant).await {
                Some(delivered) => {
                    report.hunted += 1;
                    report.delivered += delivered;
                    self.last_hunted.insert(key, Instant::now());
                }
                None => report.failed += 1,
            }
        }

        report
    }

    /// Drop interval bookkeeping for filters no longer listed as active.
    fn forget_departed(&mut self, records: &[TenantRecord]) {
        let active: HashSet<(&str, &str)> = records
            .iter()
            .filter_map(|r| Some((r.tenant_id.as_deref()?.trim(), r.filter_id.as_deref()?.trim())))
            .collect();
        self.last_hunted
            .retain(|(tenant, filter), _| active.contains(&(tenant.as_str(), filter.as_str())));
    }

    fn interval_elapsed(&self, key: &(String, String), interval_minutes: u32) -> bool {
        self.last_hunted.get(key).map_or(true, |last| {
            last.elapsed() >= Duration::from_secs(u64::from(interval_minutes) * 60)
        })
    }

    /// Returns the number of delivered listings, or `None` if the hunt failed.
    async fn hunt_tenant(&self, tenant: &TenantFilter) -> Option<usize> {
        let hunt_config = self.config.for_tenant(tenant);
        info!(tenant_id = %tenant.tenant_id, filter_id = %tenant.filter_id, "hunting");

        match AssertUnwindSafe(self.hunter.hunt(&hunt_config)).catch_unwind().await {
            Ok(Ok(listings)) => {
                info!(
                    tenant_id = %tenant.tenant_id,
                    filter_id = %tenant.filter_id,
                    delivered = listings.len(),
                    "hunt finished"
                );
                Some(listings.len())
            }
            Ok(Err(e)) => {
                error!(tenant_id = %tenant.tenant_id, filter_id = %tenant.filter_id, error = %format!("{e:#}"), "hunt failed");
                None
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(tenant_id = %tenant.tenant_id, filter_id = %tenant.filter_id, %reason, "hunt panicked");
                None
            }
        }
    }
}
