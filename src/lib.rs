//! Multi-tenant real-estate hunter.
//!
//! Crawls listing sites for every paying tenant, drops what each tenant
//! filter has already received and notifies the rest.

pub mod config;
pub mod context;
pub mod enrich;
pub mod error;
pub mod heartbeat;
pub mod hunter;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod scheduler;
pub mod scrapers;
pub mod store;
pub mod tenants;

pub use config::{Config, HuntConfig};
pub use context::AppContext;
pub use hunter::Hunter;
pub use models::{Listing, ListingId};
pub use scheduler::{CycleReport, Scheduler, ShutdownSignal};
