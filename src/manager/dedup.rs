//! Processed-event deduplication cache
//!
//! Telephony providers deliver webhooks at-least-once; the same logical event
//! may arrive several times. This cache records event ids already applied so
//! redeliveries can be discarded. Uses a TTL-based eviction strategy with a
//! hard cap on entries so the set stays bounded over a long-lived process.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default dedup TTL (1 hour — providers retry failed deliveries for minutes,
/// not hours)
const DEDUP_TTL_SECS: u64 = 3600;

/// Maximum dedup cache entries
const DEDUP_MAX_ENTRIES: usize = 8192;

/// Bounded set of already-processed event ids
#[derive(Debug)]
pub struct EventDedup {
    seen: HashMap<String, Instant>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for EventDedup {
    fn default() -> Self {
        Self {
            seen: HashMap::new(),
            ttl: Duration::from_secs(DEDUP_TTL_SECS),
            max_entries: DEDUP_MAX_ENTRIES,
        }
    }
}

impl EventDedup {
    /// Create a cache with explicit bounds (for tests and tuning).
    #[must_use]
    pub fn with_limits(ttl: Duration, max_entries: usize) -> Self {
        Self {
            seen: HashMap::new(),
            ttl,
            max_entries,
        }
    }

    /// Whether the given event id was recorded within the TTL.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.seen
            .get(id)
            .is_some_and(|ts| ts.elapsed() < self.ttl)
    }

    /// Record an event id as processed.
    ///
    /// At capacity, expired entries are evicted first; if the cache is still
    /// full, the oldest entry is dropped to make room.
    pub fn insert(&mut self, id: &str) {
        let now = Instant::now();

        if self.seen.len() >= self.max_entries {
            self.seen
                .retain(|_, ts| now.duration_since(*ts) < self.ttl);
        }

        if self.seen.len() >= self.max_entries {
            if let Some(oldest) = self
                .seen
                .iter()
                .min_by_key(|(_, ts)| *ts)
                .map(|(id, _)| id.clone())
            {
                self.seen.remove(&oldest);
            }
        }

        self.seen.insert(id.to_string(), now);
    }

    /// Number of recorded ids (including not-yet-evicted expired ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
