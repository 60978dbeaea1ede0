//! Ephemeral cache for object bytes, keyed by storage key.
//!
//! Entries are independent: each ages and is invalidated on its own. Keys are never evicted
//! for size; the keyspace is the handful of profile pictures a site goes through.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use tracing::debug;

use crate::infra::storage::{DEFAULT_CONTENT_TYPE, ObjectStore, ObjectStoreError};

use super::clock::Clock;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::image";
pub(crate) const METRIC_IMAGE_HIT: &str = "vitrine_cache_image_hit_total";
pub(crate) const METRIC_IMAGE_MISS: &str = "vitrine_cache_image_miss_total";
pub(crate) const METRIC_IMAGE_INVALIDATE: &str = "vitrine_cache_image_invalidate_total";

#[derive(Debug, Error)]
pub enum ImageCacheError {
    #[error("object `{key}` has no content")]
    NoContent { key: String },
    #[error(transparent)]
    Store(#[from] ObjectStoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedImage {
    pub bytes: Bytes,
    pub content_type: String,
}

#[derive(Debug, Clone)]
struct Entry {
    image: CachedImage,
    fetched_at: Instant,
}

pub struct ImageCache {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
    epoch: AtomicU64,
}

impl ImageCache {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            clock,
            ttl,
            entries: RwLock::new(HashMap::new()),
            epoch: AtomicU64::new(0),
        }
    }

    /// Return the bytes stored under `key`, fetching them when the entry is cold or stale.
    pub async fn read(&self, key: &str) -> Result<CachedImage, ImageCacheError> {
        if let Some(image) = self.fresh_entry(key) {
            counter!(METRIC_IMAGE_HIT).increment(1);
            return Ok(image);
        }
        counter!(METRIC_IMAGE_MISS).increment(1);

        let started = self.epoch.load(Ordering::SeqCst);
        let fetched_at = self.clock.now();
        let object = self.store.get(&self.bucket, key).await?;
        let body = object.body.ok_or_else(|| ImageCacheError::NoContent {
            key: key.to_string(),
        })?;
        let image = CachedImage {
            bytes: body.into_bytes().await?,
            content_type: object
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        };

        let mut entries = rw_write(&self.entries, SOURCE, "read.store");
        // The epoch is shared by all keys; an unrelated invalidation only costs one extra fetch.
        if self.epoch.load(Ordering::SeqCst) == started {
            entries.insert(
                key.to_string(),
                Entry {
                    image: image.clone(),
                    fetched_at,
                },
            );
        } else {
            debug!(
                cache = "image",
                key, "skipping store: invalidated while the fetch was in flight"
            );
        }

        Ok(image)
    }

    /// Drop the entry for `key`. Other keys are unaffected.
    pub fn invalidate(&self, key: &str) {
        let mut entries = rw_write(&self.entries, SOURCE, "invalidate");
        self.epoch.fetch_add(1, Ordering::SeqCst);
        entries.remove(key);
        counter!(METRIC_IMAGE_INVALIDATE).increment(1);
    }

    fn fresh_entry(&self, key: &str) -> Option<CachedImage> {
        let now = self.clock.now();
        rw_read(&self.entries, SOURCE, "read.lookup")
            .get(key)
            .filter(|entry| now.saturating_duration_since(entry.fetched_at) < self.ttl)
            .map(|entry| entry.image.clone())
    }
}
