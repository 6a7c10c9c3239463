//! Per-venue token-bucket throttling.
//!
//! Each venue gets its own `governor` limiter whose replenish period and burst
//! come from configuration. Limiters are built once per run and shared by
//! reference; the map itself is never mutated afterwards, and governor's
//! state updates are atomic, so concurrent `acquire` calls need no lock.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::{Duration, Instant};

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use tracing::{debug, warn};

use crate::config::VenueConfig;
use crate::error::{ConfigError, FetchError};
use crate::market_data::types::VenueId;

type DirectLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate budget for one venue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateBudget {
    pub requests_per_second: f64,
    pub burst: u32,
    pub max_wait: Duration,
}

impl RateBudget {
    fn quota(&self) -> Option<Quota> {
        if !self.requests_per_second.is_finite() || self.requests_per_second <= 0.0 {
            return None;
        }
        let period = Duration::try_from_secs_f64(1.0 / self.requests_per_second).ok()?;
        let burst = NonZeroU32::new(self.burst)?;
        Quota::with_period(period).map(|q| q.allow_burst(burst))
    }
}

impl From<&VenueConfig> for RateBudget {
    fn from(v: &VenueConfig) -> Self {
        Self { requests_per_second: v.requests_per_second, burst: v.burst, max_wait: v.max_wait() }
    }
}

struct VenueLimiter {
    limiter: DirectLimiter,
    max_wait: Duration,
}

/// Proof that a request slot was granted.
#[derive(Debug, Clone, PartialEq)]
pub struct Permit {
    pub venue: VenueId,
    pub waited: Duration,
}

pub struct RateLimiter {
    venues: HashMap<VenueId, VenueLimiter>,
}

impl RateLimiter {
    pub fn new(budgets: impl IntoIterator<Item = (VenueId, RateBudget)>) -> Result<Self, ConfigError> {
        let mut venues = HashMap::new();
        for (venue, budget) in budgets {
            let quota = budget.quota().ok_or_else(|| {
                ConfigError::Invalid(format!("venue {venue}: unusable rate budget {budget:?}"))
            })?;
            venues.insert(
                venue,
                VenueLimiter { limiter: GovernorRateLimiter::direct(quota), max_wait: budget.max_wait },
            );
        }
        Ok(Self { venues })
    }

    pub fn from_venues<'a>(venues: impl IntoIterator<Item = &'a VenueConfig>) -> Result<Self, ConfigError> {
        Self::new(venues.into_iter().map(|v| (v.id.clone(), RateBudget::from(v))))
    }

    /// A limiter that throttles nothing.
    pub fn unlimited() -> Self {
        Self { venues: HashMap::new() }
    }

    /// Waits for a request slot on `venue`.
    ///
    /// Fails with `RateLimitTimeout` once the venue's `max_wait` elapses.
    /// Venues without a configured budget are not throttled.
    pub async fn acquire(&self, venue: &VenueId) -> Result<Permit, FetchError> {
        let start = Instant::now();
        let Some(entry) = self.venues.get(venue) else {
            debug!(%venue, "no rate budget configured, not throttling");
            return Ok(Permit { venue: venue.clone(), waited: Duration::ZERO });
        };

        if entry.limiter.check().is_ok() {
            return Ok(Permit { venue: venue.clone(), waited: Duration::ZERO });
        }

        match tokio::time::timeout(entry.max_wait, entry.limiter.until_ready()).await {
            Ok(()) => {
                let waited = start.elapsed();
                debug!(%venue, waited_ms = waited.as_millis() as u64, "rate-limit permit granted");
                Ok(Permit { venue: venue.clone(), waited })
            }
            Err(_) => {
                warn!(%venue, max_wait_ms = entry.max_wait.as_millis() as u64, "rate-limit wait exceeded");
                Err(FetchError::RateLimitTimeout { venue: venue.clone(), waited: start.elapsed() })
            }
        }
    }
}
