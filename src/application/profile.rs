//! Public profile reads.

use std::sync::Arc;

use thiserror::Error;
use url::form_urlencoded;

use crate::application::repos::RepoError;
use crate::cache::{CachedImage, ImageCache, ImageCacheError, ProfileCache};
use crate::domain::entities::ProfileRecord;
use crate::infra::storage::ObjectStoreError;

pub const PROFILE_PHOTO_PATH: &str = "/api/profile/photo";
/// Namespace every uploaded profile picture is stored under.
pub const PICTURE_PREFIX: &str = "profile";

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("{0}")]
    ConstraintViolation(&'static str),
    #[error("`{0}` is not a profile picture")]
    NotAPicture(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Image(#[from] ImageCacheError),
    #[error(transparent)]
    Store(#[from] ObjectStoreError),
}

/// Display-ready profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileView {
    pub description: Option<String>,
    pub photo_proxy: Option<String>,
}

impl From<&ProfileRecord> for ProfileView {
    fn from(record: &ProfileRecord) -> Self {
        Self {
            description: record.description.clone(),
            photo_proxy: record
                .photo_key
                .as_deref()
                .filter(|key| !key.is_empty())
                .map(photo_proxy_url),
        }
    }
}

/// Whether `key` lies in the profile picture namespace (`profile/<name>`).
pub fn is_picture_key(key: &str) -> bool {
    key.strip_prefix(PICTURE_PREFIX)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|name| !name.is_empty())
}

/// Same-origin URL serving the profile picture stored under `key`.
pub fn photo_proxy_url(key: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(key.as_bytes()).collect();
    format!("{PROFILE_PHOTO_PATH}?key={encoded}")
}

#[derive(Clone)]
pub struct ProfileService {
    profile: Arc<ProfileCache>,
    images: Arc<ImageCache>,
}

impl ProfileService {
    pub fn new(profile: Arc<ProfileCache>, images: Arc<ImageCache>) -> Self {
        Self { profile, images }
    }

    pub async fn load(&self) -> Result<ProfileView, ProfileError> {
        let record = self.profile.read().await?;
        Ok(ProfileView::from(&record))
    }

    /// Bytes of the profile picture stored under `key`. Keys outside the picture namespace
    /// are never fetched, so gallery originals stay behind their signed URLs.
    pub async fn photo(&self, key: &str) -> Result<CachedImage, ProfileError> {
        if key.trim().is_empty() {
            return Err(ProfileError::ConstraintViolation("missing key"));
        }
        if !is_picture_key(key) {
            return Err(ProfileError::NotAPicture(key.to_string()));
        }
        Ok(self.images.read(key).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_url_encodes_the_key() {
        assert_eq!(
            photo_proxy_url("profile/1700000000000-me.jpg"),
            "/api/profile/photo?key=profile%2F1700000000000-me.jpg"
        );
    }

    #[test]
    fn only_profile_namespace_keys_are_pictures() {
        assert!(is_picture_key("profile/1700000000000-me.jpg"));
        assert!(!is_picture_key("profile/"));
        assert!(!is_picture_key("profile"));
        assert!(!is_picture_key("profiles/me.jpg"));
        assert!(!is_picture_key("9b2f6c1e-5d0a-4c57-9f43-2b7a1d0e8c11"));
    }

    #[test]
    fn view_hides_empty_photo_keys() {
        let record = ProfileRecord {
            description: Some("Hello".to_string()),
            photo_key: Some(String::new()),
        };
        let view = ProfileView::from(&record);
        assert_eq!(view.description.as_deref(), Some("Hello"));
        assert_eq!(view.photo_proxy, None);
    }

    #[test]
    fn empty_profile_has_no_proxy() {
        let view = ProfileView::from(&ProfileRecord::default());
        assert_eq!(
            view,
            ProfileView {
                description: None,
                photo_proxy: None
            }
        );
    }
}
