//! Delivery tracking: which listings each tenant filter has already received.
//!
//! The store is split in two layers. A [`DeliveryRepository`] talks to the
//! backing database and is shared process-wide. A [`DedupSession`] is opened
//! per hunt, bulk-loads the delivered keys for one tenant filter, and answers
//! membership checks from memory for the rest of the cycle.

mod memory;
mod postgres;
mod repository;
mod session;

pub use memory::MemoryDeliveryRepository;
pub use postgres::PgDeliveryRepository;
pub use repository::DeliveryRepository;
pub use session::{DedupSession, DedupStore};
