//! Commute-time lookups used by the duration enrichment stage.

mod gmaps;

pub use gmaps::GoogleMapsDurations;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Transit,
    Driving,
    Bicycling,
    Walking,
}

impl TravelMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TravelMode::Transit => "transit",
            TravelMode::Driving => "driving",
            TravelMode::Bicycling => "bicycling",
            TravelMode::Walking => "walking",
        }
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A place the tenant wants commute times to, e.g. their office.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationTarget {
    pub name: String,
    pub destination: String,
    #[serde(default = "default_modes")]
    pub modes: Vec<TravelMode>,
}

fn default_modes() -> Vec<TravelMode> {
    vec![TravelMode::Transit]
}

/// Anything that can tell how long it takes to get from A to B.
#[async_trait]
pub trait DurationSource: Send + Sync {
    /// Human-readable duration, e.g. `"23 mins"`.
    async fn duration(&self, origin: &str, destination: &str, mode: TravelMode) -> Result<String>;
}
