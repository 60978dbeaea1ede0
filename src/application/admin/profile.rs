use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use time::OffsetDateTime;
use tracing::info;

use crate::application::profile::{PICTURE_PREFIX, ProfileError, ProfileView, is_picture_key};
use crate::application::repos::{ProfileChanges, ProfileRepo};
use crate::cache::{ImageCache, ProfileCache};
use crate::infra::storage::{
    DEFAULT_CONTENT_TYPE, ObjectStore, SignedMethod, sanitize_filename, validate_key,
};
use crate::live::{ProfileNotifier, ProfileUpdate};

/// Signed URL the browser uploads a new picture to, and the key it will live under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTicket {
    pub url: String,
    pub key: String,
}

#[derive(Clone)]
pub struct AdminProfileService {
    repo: Arc<dyn ProfileRepo>,
    profile: Arc<ProfileCache>,
    images: Arc<ImageCache>,
    notifier: Arc<ProfileNotifier>,
    store: Arc<dyn ObjectStore>,
    bucket: String,
    upload_ttl: Duration,
}

impl AdminProfileService {
    pub fn new(
        repo: Arc<dyn ProfileRepo>,
        profile: Arc<ProfileCache>,
        images: Arc<ImageCache>,
        notifier: Arc<ProfileNotifier>,
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        upload_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            profile,
            images,
            notifier,
            store,
            bucket: bucket.into(),
            upload_ttl,
        }
    }

    /// Write the profile, drop every cached copy it affects and tell live observers.
    pub async fn update(&self, changes: ProfileChanges) -> Result<ProfileView, ProfileError> {
        if let Some(key) = changes.photo_key.as_deref().filter(|key| !key.is_empty()) {
            validate_key(key)?;
            if !is_picture_key(key) {
                return Err(ProfileError::ConstraintViolation(
                    "photo must be an uploaded profile picture",
                ));
            }
        }

        let previous_key = self
            .repo
            .find_first_profile()
            .await?
            .and_then(|profile| profile.photo_key);
        let record = self.repo.upsert_profile(changes).await?;

        self.profile.invalidate();
        if let Some(key) = record.photo_key.as_deref() {
            self.images.invalidate(key);
        }
        if let Some(old) = previous_key.as_deref()
            && record.photo_key.as_deref() != Some(old)
        {
            self.images.invalidate(old);
        }

        let view = ProfileView::from(&record);
        self.notifier.publish(&ProfileUpdate {
            photo_url: view.photo_proxy.clone(),
            description: view.description.clone(),
        });
        info!(
            target = "vitrine::admin::profile",
            has_photo = view.photo_proxy.is_some(),
            "profile updated"
        );

        Ok(view)
    }

    /// Store an uploaded picture and return its key. The profile itself is not changed.
    pub async fn store_picture(
        &self,
        filename: Option<&str>,
        content_type: Option<&str>,
        bytes: Bytes,
    ) -> Result<String, ProfileError> {
        if bytes.is_empty() {
            return Err(ProfileError::ConstraintViolation("No file provided"));
        }

        let key = picture_key(filename, OffsetDateTime::now_utc());
        let content_type = content_type
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        self.store
            .put(&self.bucket, &key, bytes, content_type)
            .await?;
        Ok(key)
    }

    /// Issue a signed `PUT` URL for a picture the browser uploads directly.
    pub fn upload_url(&self, filename: Option<&str>) -> Result<UploadTicket, ProfileError> {
        let key = picture_key(filename, OffsetDateTime::now_utc());
        let url = self
            .store
            .signed_url(&self.bucket, &key, SignedMethod::Put, self.upload_ttl)?;
        Ok(UploadTicket { url, key })
    }
}

/// `profile/<unix millis>-<sanitized name>`; a missing name becomes `profile-<unix millis>`.
pub(crate) fn picture_key(filename: Option<&str>, now: OffsetDateTime) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    let name = filename
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(sanitize_filename)
        .unwrap_or_else(|| format!("profile-{millis}"));
    format!("{PICTURE_PREFIX}/{millis}-{name}")
}
