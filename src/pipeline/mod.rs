//! Listing pipeline: an ordered list of stages folded over one crawl's output.
//!
//! ```text
//! crawl ─► already-seen ─► predicates ─► persist ─► enrich ─► notify ─► mark-delivered
//! ```
//!
//! Each stage consumes the whole output of the previous one before the next
//! starts. The builder refuses orders in which a listing could be persisted,
//! notified or marked before it went through the filters.

mod enrich;
mod filters;
mod notify;
mod persist;

pub use enrich::{CalculateDurations, CrawlDetails, ResolveAddresses};
pub use filters::{AlreadySeenFilter, Predicate, PredicateFilter};
pub use notify::SendMessages;
pub use persist::{MarkDelivered, SaveAllListings};

use async_trait::async_trait;
use tracing::debug;

use crate::error::PipelineError;
use crate::models::Listing;

/// What a stage does, which decides where it may sit in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    AlreadySeen,
    Predicate,
    Persist,
    Enrich,
    Notify,
    MarkDelivered,
}

impl StageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::AlreadySeen => "already-seen",
            StageKind::Predicate => "predicate",
            StageKind::Persist => "persist",
            StageKind::Enrich => "enrich",
            StageKind::Notify => "notify",
            StageKind::MarkDelivered => "mark-delivered",
        }
    }

    /// Stages must appear in non-decreasing phase order.
    fn phase(self) -> u8 {
        match self {
            StageKind::AlreadySeen | StageKind::Predicate => 0,
            StageKind::Persist | StageKind::Enrich => 1,
            StageKind::Notify => 2,
            StageKind::MarkDelivered => 3,
        }
    }
}

/// One step of the pipeline. May filter, enrich or cause side effects,
/// and returns the listings the next stage should see.
#[async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    async fn process(&self, listings: Vec<Listing>) -> Vec<Listing>;
}

/// Ordered stages built for one hunt cycle.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order over the listings.
    pub async fn run(&self, listings: Vec<Listing>) -> Vec<Listing> {
        let mut current = listings;
        for stage in &self.stages {
            let before = current.len();
            current = stage.process(current).await;
            debug!(stage = stage.name(), before, after = current.len(), "stage finished");
        }
        current
    }
}

/// Explicit, per-cycle assembly of a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Box<dyn Stage>>,
}

impl PipelineBuilder {
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn filter_already_seen(self, filter: AlreadySeenFilter) -> Self {
        self.stage(filter)
    }

    pub fn apply_filter(self, filter: PredicateFilter) -> Self {
        self.stage(filter)
    }

    pub fn save_all_listings(self, stage: SaveAllListings) -> Self {
        self.stage(stage)
    }

    pub fn crawl_details(self, stage: CrawlDetails) -> Self {
        self.stage(stage)
    }

    pub fn resolve_addresses(self, stage: ResolveAddresses) -> Self {
        self.stage(stage)
    }

    pub fn calculate_durations(self, stage: CalculateDurations) -> Self {
        self.stage(stage)
    }

    pub fn send_messages(self, stage: SendMessages) -> Self {
        self.stage(stage)
    }

    pub fn mark_as_delivered(self, stage: MarkDelivered) -> Self {
        self.stage(stage)
    }

    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let mut previous: Option<StageKind> = None;
        for (idx, stage) in self.stages.iter().enumerate() {
            let kind = stage.kind();
            if let Some(prev) = previous {
                if kind.phase() < prev.phase() {
                    return Err(PipelineError::StageOrder {
                        stage: kind.as_str(),
                        after: prev.as_str(),
                    });
                }
            }
            if kind == StageKind::MarkDelivered && idx + 1 != self.stages.len() {
                return Err(PipelineError::NotTerminal(kind.as_str()));
            }
            previous = Some(kind);
        }

        Ok(Pipeline { stages: self.stages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records the stage order and drops listings with odd ids when filtering.
    struct Probe {
        kind: StageKind,
        log: Arc<Mutex<Vec<(StageKind, usize)>>>,
        drop_odd: bool,
    }

    #[async_trait]
    impl Stage for Probe {
        fn kind(&self) -> StageKind {
            self.kind
        }

        async fn process(&self, listings: Vec<Listing>) -> Vec<Listing> {
            self.log.lock().unwrap().push((self.kind, listings.len()));
            if self.drop_odd {
                listings
                    .into_iter()
                    .filter(|l| l.id.as_key().parse::<i64>().unwrap_or(0) % 2 == 0)
                    .collect()
            } else {
                listings
            }
        }
    }

    fn probe(kind: StageKind, log: &Arc<Mutex<Vec<(StageKind, usize)>>>) -> Probe {
        Probe { kind, log: log.clone(), drop_odd: kind == StageKind::Predicate }
    }

    #[tokio::test]
    async fn runs_stages_in_order_over_shrinking_input() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .stage(probe(StageKind::AlreadySeen, &log))
            .stage(probe(StageKind::Predicate, &log))
            .stage(probe(StageKind::Persist, &log))
            .stage(probe(StageKind::Notify, &log))
            .stage(probe(StageKind::MarkDelivered, &log))
            .build()
            .unwrap();

        let listings = (1..=4).map(|i| Listing::new(i, "site", "t")).collect();
        let out = pipeline.run(listings).await;

        assert_eq!(out.len(), 2);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                (StageKind::AlreadySeen, 4),
                (StageKind::Predicate, 4),
                (StageKind::Persist, 2),
                (StageKind::Notify, 2),
                (StageKind::MarkDelivered, 2),
            ]
        );
    }

    #[test]
    fn rejects_filter_after_persistence() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let err = Pipeline::builder()
            .stage(probe(StageKind::Persist, &log))
            .stage(probe(StageKind::AlreadySeen, &log))
            .build()
            .err()
            .unwrap();
        assert_eq!(
            err,
            PipelineError::StageOrder { stage: "already-seen", after: "persist" }
        );
    }

    #[test]
    fn rejects_notify_after_mark_delivered() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let result = Pipeline::builder()
            .stage(probe(StageKind::MarkDelivered, &log))
            .stage(probe(StageKind::Notify, &log))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_two_terminal_stages() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let err = Pipeline::builder()
            .stage(probe(StageKind::MarkDelivered, &log))
            .stage(probe(StageKind::MarkDelivered, &log))
            .build()
            .err()
            .unwrap();
        assert_eq!(err, PipelineError::NotTerminal("mark-delivered"));
    }
}
