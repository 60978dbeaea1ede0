//! Cache configuration.

use std::time::Duration;

const DEFAULT_PROFILE_TTL: Duration = Duration::from_secs(30);
const DEFAULT_IMAGE_TTL: Duration = Duration::from_secs(60 * 60);

/// Time-to-live applied by the ephemeral caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long the profile record is served from memory.
    pub profile_ttl: Duration,
    /// How long fetched image bytes are served from memory.
    pub image_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            profile_ttl: DEFAULT_PROFILE_TTL,
            image_ttl: DEFAULT_IMAGE_TTL,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            profile_ttl: settings.profile_ttl,
            image_ttl: settings.image_ttl,
        }
    }
}
