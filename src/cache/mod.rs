//! In-process caches fronting the record store and the object store.
//!
//! - [`ProfileCache`]: the single profile record, short TTL.
//! - [`ImageCache`]: object bytes keyed by storage key, long TTL.
//!
//! Both are constructed by the composition root with an injected [`Clock`] and backing store,
//! and both expose explicit invalidation for writers.

mod clock;
mod config;
mod image;
pub(crate) mod lock;
mod profile;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use image::{CachedImage, ImageCache, ImageCacheError};
pub use profile::ProfileCache;

pub(crate) use image::{METRIC_IMAGE_HIT, METRIC_IMAGE_INVALIDATE, METRIC_IMAGE_MISS};
pub(crate) use profile::{METRIC_PROFILE_HIT, METRIC_PROFILE_INVALIDATE, METRIC_PROFILE_MISS};
