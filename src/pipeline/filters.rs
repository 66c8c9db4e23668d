use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use tracing::debug;

use super::{Stage, StageKind};
use crate::models::Listing;
use crate::scrapers::SearchCriteria;
use crate::store::DedupSession;

/// Drops listings this tenant filter has already been sent, and repeats of
/// the same listing within one crawl (e.g. across result pages).
pub struct AlreadySeenFilter {
    session: Arc<DedupSession>,
}

impl AlreadySeenFilter {
    pub fn new(session: Arc<DedupSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Stage for AlreadySeenFilter {
    fn kind(&self) -> StageKind {
        StageKind::AlreadySeen
    }

    async fn process(&self, listings: Vec<Listing>) -> Vec<Listing> {
        let total = listings.len();
        let mut batch = HashSet::new();
        let fresh: Vec<Listing> = listings
            .into_iter()
            .filter(|l| !self.session.is_listing_delivered(l))
            .filter(|l| batch.insert((l.id.as_key(), l.source.clone())))
            .collect();
        debug!(
            tenant_id = %self.session.tenant_id(),
            total,
            fresh = fresh.len(),
            "filtered already delivered listings"
        );
        fresh
    }
}

/// One tenant-configured criterion. Listings lacking the compared value pass.
#[derive(Debug, Clone)]
pub enum Predicate {
    MinPrice(f64),
    MaxPrice(f64),
    MinRooms(f64),
    MaxRooms(f64),
    MinSize(f64),
    MaxSize(f64),
    ExcludedTitle(Regex),
}

impl Predicate {
    pub fn accepts(&self, listing: &Listing) -> bool {
        match self {
            Predicate::MinPrice(min) => listing.price.map_or(true, |p| p >= *min),
            Predicate::MaxPrice(max) => listing.price.map_or(true, |p| p <= *max),
            Predicate::MinRooms(min) => listing.rooms.map_or(true, |r| r >= *min),
            Predicate::MaxRooms(max) => listing.rooms.map_or(true, |r| r <= *max),
            Predicate::MinSize(min) => listing.size.map_or(true, |s| s >= *min),
            Predicate::MaxSize(max) => listing.size.map_or(true, |s| s <= *max),
            Predicate::ExcludedTitle(pattern) => !pattern.is_match(&listing.title),
        }
    }
}

/// Drops listings failing any tenant criterion; the first failing predicate decides.
#[derive(Debug, Clone, Default)]
pub struct PredicateFilter {
    predicates: Vec<Predicate>,
}

impl PredicateFilter {
    pub fn new(predicates: Vec<Predicate>) -> Self {
        Self { predicates }
    }

    pub fn from_criteria(criteria: &SearchCriteria) -> Result<Self, regex::Error> {
        let bounds: [(Option<f64>, fn(f64) -> Predicate); 6] = [
            (criteria.min_price, Predicate::MinPrice),
            (criteria.max_price, Predicate::MaxPrice),
            (criteria.min_rooms, Predicate::MinRooms),
            (criteria.max_rooms, Predicate::MaxRooms),
            (criteria.min_size, Predicate::MinSize),
            (criteria.max_size, Predicate::MaxSize),
        ];
        let mut predicates: Vec<Predicate> = bounds
            .into_iter()
            .filter_map(|(value, make)| value.map(make))
            .collect();

        for pattern in &criteria.excluded_titles {
            let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
            predicates.push(Predicate::ExcludedTitle(regex));
        }

        Ok(Self { predicates })
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn accepts(&self, listing: &Listing) -> bool {
        self.predicates.iter().all(|p| p.accepts(listing))
    }
}

#[async_trait]
impl Stage for PredicateFilter {
    fn kind(&self) -> StageKind {
        StageKind::Predicate
    }

    async fn process(&self, listings: Vec<Listing>) -> Vec<Listing> {
        listings.into_iter().filter(|l| self.accepts(l)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DedupStore, MemoryDeliveryRepository};

    fn listing(id: i64, price: Option<f64>, rooms: Option<f64>, title: &str) -> Listing {
        let mut listing = Listing::new(id, "site", title);
        listing.price = price;
        listing.rooms = rooms;
        listing
    }

    #[tokio::test]
    async fn already_seen_filter_drops_delivered() {
        let store = DedupStore::new(Arc::new(MemoryDeliveryRepository::new()));
        let session = Arc::new(store.open("t-1", "f-1").await.unwrap());
        session.mark_delivered("1", "site").await;

        let filter = AlreadySeenFilter::new(session);
        let out = filter
            .process(vec![listing(1, None, None, "a"), listing(2, None, None, "b")])
            .await;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id.as_key(), "2");
    }

    #[tokio::test]
    async fn already_seen_filter_drops_repeats_within_batch() {
        let store = DedupStore::new(Arc::new(MemoryDeliveryRepository::new()));
        let filter = AlreadySeenFilter::new(Arc::new(store.open("t-1", "f-1").await.unwrap()));

        let mut other_source = listing(1, None, None, "c");
        other_source.source = "elsewhere".to_string();
        let out = filter
            .process(vec![listing(1, None, None, "a"), listing(1, None, None, "a"), other_source])
            .await;

        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn predicates_from_criteria() {
        let criteria = SearchCriteria {
            max_price: Some(1000.0),
            min_rooms: Some(2.0),
            excluded_titles: vec!["tausch".to_string()],
            ..SearchCriteria::default()
        };
        let filter = PredicateFilter::from_criteria(&criteria).unwrap();

        let out = filter
            .process(vec![
                listing(1, Some(900.0), Some(2.0), "Nice flat"),
                listing(2, Some(1200.0), Some(3.0), "Too expensive"),
                listing(3, Some(800.0), Some(1.0), "Too small"),
                listing(4, None, None, "Unknown price"),
                listing(5, Some(700.0), Some(3.0), "Wohnungs-TAUSCH"),
            ])
            .await;

        let ids: Vec<String> = out.iter().map(|l| l.id.as_key()).collect();
        assert_eq!(ids, vec!["1", "4"]);
    }

    #[test]
    fn empty_criteria_build_no_predicates() {
        let filter = PredicateFilter::from_criteria(&SearchCriteria::default()).unwrap();
        assert!(filter.is_empty());
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let criteria = SearchCriteria {
            excluded_titles: vec!["(".to_string()],
            ..SearchCriteria::default()
        };
        assert!(PredicateFilter::from_criteria(&criteria).is_err());
    }
}
