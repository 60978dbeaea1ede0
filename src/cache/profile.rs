//! Ephemeral cache for the single site profile.
//!
//! A warm entry is served from memory until it is `ttl` old; afterwards the next read goes to
//! the repository. Concurrent cold reads are not coalesced, each may hit the repository.
//!
//! Every invalidation bumps an epoch. A read that started before an invalidation still returns
//! what it fetched but does not store it, so an invalidation is never undone by a slow read.

use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use metrics::counter;
use tracing::debug;

use crate::application::repos::{ProfileRepo, RepoError};
use crate::domain::entities::ProfileRecord;

use super::clock::Clock;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::profile";
pub(crate) const METRIC_PROFILE_HIT: &str = "vitrine_cache_profile_hit_total";
pub(crate) const METRIC_PROFILE_MISS: &str = "vitrine_cache_profile_miss_total";
pub(crate) const METRIC_PROFILE_INVALIDATE: &str = "vitrine_cache_profile_invalidate_total";

#[derive(Debug, Clone)]
struct CachedRecord {
    value: ProfileRecord,
    fetched_at: Instant,
}

pub struct ProfileCache {
    repo: Arc<dyn ProfileRepo>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entry: RwLock<Option<CachedRecord>>,
    epoch: AtomicU64,
}

impl ProfileCache {
    pub fn new(repo: Arc<dyn ProfileRepo>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            repo,
            clock,
            ttl,
            entry: RwLock::new(None),
            epoch: AtomicU64::new(0),
        }
    }

    /// Return the profile, reading through to the repository when the entry is cold or stale.
    ///
    /// A missing profile reads as the empty record. Repository errors propagate and leave the
    /// previous entry untouched.
    pub async fn read(&self) -> Result<ProfileRecord, RepoError> {
        if let Some(value) = self.fresh_value() {
            counter!(METRIC_PROFILE_HIT).increment(1);
            return Ok(value);
        }
        counter!(METRIC_PROFILE_MISS).increment(1);

        let started = self.epoch.load(Ordering::SeqCst);
        let fetched_at = self.clock.now();
        let value = self.repo.find_first_profile().await?.unwrap_or_default();

        let mut entry = rw_write(&self.entry, SOURCE, "read.store");
        if self.epoch.load(Ordering::SeqCst) == started {
            *entry = Some(CachedRecord {
                value: value.clone(),
                fetched_at,
            });
        } else {
            debug!(
                cache = "profile",
                "skipping store: invalidated while the read was in flight"
            );
        }

        Ok(value)
    }

    /// Drop the cached entry so the next read goes to the repository.
    pub fn invalidate(&self) {
        let mut entry = rw_write(&self.entry, SOURCE, "invalidate");
        self.epoch.fetch_add(1, Ordering::SeqCst);
        *entry = None;
        counter!(METRIC_PROFILE_INVALIDATE).increment(1);
    }

    fn fresh_value(&self) -> Option<ProfileRecord> {
        let now = self.clock.now();
        rw_read(&self.entry, SOURCE, "read.lookup")
            .as_ref()
            .filter(|cached| now.saturating_duration_since(cached.fetched_at) < self.ttl)
            .map(|cached| cached.value.clone())
    }
}
