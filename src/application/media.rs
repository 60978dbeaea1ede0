//! Resolution of photo renditions to signed retrieval URLs.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::domain::types::SizeClass;
use crate::infra::storage::{ObjectStore, ObjectStoreError, SignedMethod};

/// Picks the best stored rendition of a photo and signs a URL for it.
///
/// Nothing is cached here: every call re-checks existence and signs a fresh URL.
#[derive(Clone)]
pub struct ImageVariantResolver {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    ttl: Duration,
}

impl ImageVariantResolver {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            ttl,
        }
    }

    /// Storage key serving `size` for `photo_id`.
    ///
    /// A missing derivative falls back to the original key. Store failures during the
    /// existence check are returned to the caller.
    pub async fn resolve_key(
        &self,
        photo_id: &str,
        size: SizeClass,
    ) -> Result<String, ObjectStoreError> {
        if size == SizeClass::Original {
            return Ok(photo_id.to_string());
        }

        let candidate = size.storage_key(photo_id);
        if self.store.exists(&self.bucket, &candidate).await? {
            Ok(candidate)
        } else {
            debug!(
                photo_id,
                size = size.as_str(),
                "derivative missing, serving original"
            );
            Ok(photo_id.to_string())
        }
    }

    pub async fn resolve(
        &self,
        photo_id: &str,
        size: SizeClass,
    ) -> Result<String, ObjectStoreError> {
        let key = self.resolve_key(photo_id, size).await?;
        self.store
            .signed_url(&self.bucket, &key, SignedMethod::Get, self.ttl)
    }
}
