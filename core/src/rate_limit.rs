//! Rate-limit bookkeeping.
//!
//! # Design
//! The server reports its rate-limit window on every response through three
//! headers. `RateLimitTracker` turns those into a [`RateLimitSnapshot`] and
//! keeps only the most recent one: a single slot, last writer wins, no
//! history. Responses missing any of the headers leave the slot untouched.
//!
//! The tracker only observes. It never delays or rejects requests.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::http::HttpResponse;

pub const LIMIT_HEADER: &str = "X-RateLimit-Limit";
pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";
pub const RESET_HEADER: &str = "X-RateLimit-Reset";

/// Rate-limit state reported by the server on a single response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitSnapshot {
    /// Requests allowed in the current window.
    pub limit: u64,
    /// Requests left in the current window.
    pub remaining: u64,
    /// Unix timestamp (seconds) at which the window resets.
    pub reset_at: i64,
    /// Milliseconds from observation until the reset, never negative.
    pub reset_in_ms: u64,
}

impl RateLimitSnapshot {
    /// Parse the rate-limit headers of `response` against the clock value
    /// `now_ms` (Unix milliseconds).
    ///
    /// Returns `None` if any header is missing or not a number.
    pub fn parse(response: &HttpResponse, now_ms: i64) -> Option<Self> {
        let limit = response.header(LIMIT_HEADER)?.trim().parse::<u64>().ok()?;
        let remaining = response.header(REMAINING_HEADER)?.trim().parse::<u64>().ok()?;
        let reset_at = response.header(RESET_HEADER)?.trim().parse::<i64>().ok()?;

        let reset_in_ms = reset_at
            .saturating_mul(1000)
            .saturating_sub(now_ms)
            .max(0)
            .unsigned_abs();

        Some(Self {
            limit,
            remaining,
            reset_at,
            reset_in_ms,
        })
    }

    /// Whole seconds until reset, rounded up.
    pub fn reset_in_secs(&self) -> u64 {
        self.reset_in_ms.div_ceil(1000)
    }
}

/// Holds the last-known [`RateLimitSnapshot`] for one client.
#[derive(Debug, Default)]
pub struct RateLimitTracker {
    latest: RwLock<Option<RateLimitSnapshot>>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `response` against the current wall clock and, if it carried a
    /// complete set of headers, store the result.
    pub fn update(&self, response: &HttpResponse) -> Option<RateLimitSnapshot> {
        self.update_at(response, chrono::Utc::now().timestamp_millis())
    }

    /// Same as [`update`](Self::update) with an explicit clock value.
    pub fn update_at(&self, response: &HttpResponse, now_ms: i64) -> Option<RateLimitSnapshot> {
        let snapshot = RateLimitSnapshot::parse(response, now_ms)?;
        *self.latest.write() = Some(snapshot);
        Some(snapshot)
    }

    pub fn latest(&self) -> Option<RateLimitSnapshot> {
        *self.latest.read()
    }
}
