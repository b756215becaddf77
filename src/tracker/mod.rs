//! In-memory visit log and country counters
//!
//! Everything lives behind one mutex: each recorded visit bumps exactly one
//! counter and appends exactly one record inside the same critical section,
//! so readers always see `us_requests + non_us_requests == visits.len()`.

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::geo::LocationInfo;

/// Country name that routes a visit into the US bucket (exact match)
pub const US_COUNTRY_NAME: &str = "United States";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub ip: String,
    pub country: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitStats {
    pub us_requests: u64,
    pub non_us_requests: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterBucket {
    Us,
    NonUs,
}

impl CounterBucket {
    pub fn for_country(country_name: &str) -> Self {
        if country_name == US_COUNTRY_NAME {
            CounterBucket::Us
        } else {
            CounterBucket::NonUs
        }
    }
}

#[derive(Default)]
struct TrackerState {
    visits: Vec<VisitRecord>,
    stats: VisitStats,
}

#[derive(Default)]
pub struct VisitTracker {
    state: Mutex<TrackerState>,
}

impl VisitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful lookup for `ip`
    pub async fn record(&self, ip: &str, location: &LocationInfo) -> CounterBucket {
        let bucket = CounterBucket::for_country(&location.country_name);
        let record = VisitRecord {
            ip: ip.to_string(),
            country: location.country_name.clone(),
        };

        let mut state = self.state.lock().await;
        match bucket {
            CounterBucket::Us => state.stats.us_requests += 1,
            CounterBucket::NonUs => state.stats.non_us_requests += 1,
        }
        state.visits.push(record);

        bucket
    }

    /// Snapshot of every recorded visit, oldest first
    pub async fn visits(&self) -> Vec<VisitRecord> {
        self.state.lock().await.visits.clone()
    }

    pub async fn stats(&self) -> VisitStats {
        self.state.lock().await.stats
    }
}
