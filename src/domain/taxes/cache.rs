//! Tax quote cache
//!
//! An injected port rather than a global cache service, so the calculator
//! stays testable without a real cache backend. Entries are keyed by the
//! full condition tuple and live for a bounded TTL.

use std::sync::{Mutex, PoisonError};

use jiff::{SignedDuration, Timestamp};
use mockall::automock;
use rustc_hash::FxHashMap;

use crate::domain::taxes::models::{TaxAssessment, TaxQuery, TaxTreatment};

/// Cache key: the full condition tuple of a quote.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaxCacheKey {
    pub query: TaxQuery,
    pub treatment: TaxTreatment,
}

#[automock]
pub trait TaxCache: Send + Sync {
    /// Returns a still-live cached assessment.
    fn get(&self, key: &TaxCacheKey, now: Timestamp) -> Option<TaxAssessment>;

    /// Stores an assessment; implementations decide expiry.
    fn put(&self, key: TaxCacheKey, assessment: TaxAssessment, now: Timestamp);
}

/// In-process cache with a fixed TTL.
#[derive(Debug)]
pub struct InMemoryTaxCache {
    ttl: SignedDuration,
    entries: Mutex<FxHashMap<TaxCacheKey, (Timestamp, TaxAssessment)>>,
}

impl InMemoryTaxCache {
    #[must_use]
    pub fn new(ttl: SignedDuration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(FxHashMap::default()),
        }
    }
}

impl TaxCache for InMemoryTaxCache {
    fn get(&self, key: &TaxCacheKey, now: Timestamp) -> Option<TaxAssessment> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        entries
            .get(key)
            .filter(|(expires_at, _)| *expires_at > now)
            .map(|(_, assessment)| assessment.clone())
    }

    fn put(&self, key: TaxCacheKey, assessment: TaxAssessment, now: Timestamp) {
        let expires_at = now.checked_add(self.ttl).unwrap_or(Timestamp::MAX);

        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Drop anything already expired while we hold the lock.
        entries.retain(|_, (expiry, _)| *expiry > now);
        entries.insert(key, (expires_at, assessment));
    }
}
