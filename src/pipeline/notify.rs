use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::{Stage, StageKind};
use crate::models::Listing;
use crate::notify::{broadcast, MessageRenderer, Notifier};

/// Renders each listing and sends it to every receiver on every channel.
///
/// A listing continues to mark-delivered once at least one receiver got it.
/// If rendering fails or every receiver fails, it is held back so the next
/// cycle tries again instead of losing it.
pub struct SendMessages {
    renderer: MessageRenderer,
    notifiers: Vec<Arc<dyn Notifier>>,
    receivers: Vec<String>,
}

impl SendMessages {
    pub fn new(renderer: MessageRenderer, notifiers: Vec<Arc<dyn Notifier>>, receivers: Vec<String>) -> Self {
        Self {
            renderer,
            notifiers,
            receivers,
        }
    }

    async fn deliver(&self, listing: &Listing) -> bool {
        let text = match self.renderer.render(listing) {
            Ok(text) => text,
            Err(e) => {
                error!(listing_id = %listing.id, source = %listing.source, error = %e, "failed to render message");
                return false;
            }
        };

        let mut delivered = 0;
        let mut attempted = 0;
        for notifier in &self.notifiers {
            let outcomes = broadcast(notifier.as_ref(), &self.receivers, &text).await;
            attempted += outcomes.len();
            delivered += outcomes.iter().filter(|o| o.success).count();
        }

        if attempted > 0 && delivered == 0 {
            warn!(listing_id = %listing.id, source = %listing.source, attempted, "no receiver got the listing");
            return false;
        }
        true
    }
}

#[async_trait]
impl Stage for SendMessages {
    fn kind(&self) -> StageKind {
        StageKind::Notify
    }

    async fn process(&self, listings: Vec<Listing>) -> Vec<Listing> {
        let mut sent = Vec::with_capacity(listings.len());
        for listing in listings {
            if self.deliver(&listing).await {
                info!(listing_id = %listing.id, source = %listing.source, "New offer: {}", listing.title);
                sent.push(listing);
            }
        }
        sent
    }
}
