use std::sync::Arc;

use async_trait::async_trait;

use super::{Stage, StageKind};
use crate::models::Listing;
use crate::store::DedupSession;

/// Records every surviving listing as seen; passes them through unchanged.
pub struct SaveAllListings {
    session: Arc<DedupSession>,
}

impl SaveAllListings {
    pub fn new(session: Arc<DedupSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Stage for SaveAllListings {
    fn kind(&self) -> StageKind {
        StageKind::Persist
    }

    async fn process(&self, listings: Vec<Listing>) -> Vec<Listing> {
        for listing in &listings {
            self.session.record_seen(listing).await;
        }
        listings
    }
}

/// Terminal stage: everything that reaches it counts as delivered.
pub struct MarkDelivered {
    session: Arc<DedupSession>,
}

impl MarkDelivered {
    pub fn new(session: Arc<DedupSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Stage for MarkDelivered {
    fn kind(&self) -> StageKind {
        StageKind::MarkDelivered
    }

    async fn process(&self, listings: Vec<Listing>) -> Vec<Listing> {
        for listing in &listings {
            self.session
                .mark_delivered(&listing.id.as_key(), &listing.source)
                .await;
        }
        listings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DedupStore, MemoryDeliveryRepository};

    #[tokio::test]
    async fn save_then_mark() {
        let repo = Arc::new(MemoryDeliveryRepository::new());
        let session = Arc::new(DedupStore::new(repo.clone()).open("t-1", "f-1").await.unwrap());
        let listings = vec![Listing::new(1, "site", "a"), Listing::new(2, "site", "b")];

        let saved = SaveAllListings::new(session.clone()).process(listings).await;
        assert_eq!(saved.len(), 2);
        assert!(repo.records().iter().all(|r| !r.delivered));

        let marked = MarkDelivered::new(session.clone()).process(saved).await;
        assert_eq!(marked.len(), 2);
        assert!(repo.records().iter().all(|r| r.delivered));
        assert!(session.is_delivered("1", "site"));
        assert!(session.is_delivered("2", "site"));
    }
}
