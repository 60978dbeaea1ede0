use std::sync::Arc;

use bytes::Bytes;
use futures::future::{join_all, try_join_all};
use metrics::counter;
use tracing::{info, warn};
use uuid::Uuid;
use vitrine_api_types::{AdminPhotoListResponse, AdminPhotoSummary};

use crate::application::media::ImageVariantResolver;
use crate::application::photos::{PhotoError, ensure_page_exists};
use crate::application::repos::{
    AlbumsRepo, NewPhoto, PhotoChanges, PhotoScope, PhotosRepo, RepoError,
};
use crate::domain::entities::PhotoRecord;
use crate::domain::types::SizeClass;
use crate::infra::imaging::{DERIVATIVE_CONTENT_TYPE, ImageResizer};
use crate::infra::storage::{DEFAULT_CONTENT_TYPE, ObjectStore};

pub(crate) const METRIC_DERIVATIVE_FAILED: &str = "vitrine_upload_derivative_failed_total";

/// A photo as received from the upload form.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub description: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Clone)]
pub struct AdminPhotoService {
    photos: Arc<dyn PhotosRepo>,
    albums: Arc<dyn AlbumsRepo>,
    store: Arc<dyn ObjectStore>,
    resizer: Arc<dyn ImageResizer>,
    resolver: ImageVariantResolver,
    bucket: String,
    page_size: u64,
}

impl AdminPhotoService {
    pub fn new(
        photos: Arc<dyn PhotosRepo>,
        albums: Arc<dyn AlbumsRepo>,
        store: Arc<dyn ObjectStore>,
        resizer: Arc<dyn ImageResizer>,
        resolver: ImageVariantResolver,
        bucket: impl Into<String>,
        page_size: u64,
    ) -> Self {
        Self {
            photos,
            albums,
            store,
            resizer,
            resolver,
            bucket: bucket.into(),
            page_size: page_size.max(1),
        }
    }

    /// One page of all photos, hidden ones included, with original renditions.
    pub async fn list(&self, skip: u64) -> Result<AdminPhotoListResponse, PhotoError> {
        let total = self.photos.count_photos(PhotoScope::All).await?;
        ensure_page_exists(skip, total)?;

        let records = self
            .photos
            .list_photos(PhotoScope::All, skip, self.page_size)
            .await?;
        let photos = try_join_all(records.into_iter().map(|record| self.summary(record))).await?;
        let has_remaining = total > skip.saturating_add(photos.len() as u64);

        Ok(AdminPhotoListResponse {
            photos,
            has_remaining,
            total,
        })
    }

    /// Store the original and its derivatives, then record the photo.
    ///
    /// A derivative that fails to render or upload is logged and skipped; readers fall back to
    /// the original for it.
    pub async fn upload(&self, upload: PhotoUpload) -> Result<Uuid, PhotoError> {
        if upload.bytes.is_empty() {
            return Err(PhotoError::ConstraintViolation("No file provided"));
        }

        let dimensions = self.resizer.dimensions(&upload.bytes)?;
        let width = i32::try_from(dimensions.width)
            .map_err(|_| PhotoError::ConstraintViolation("image is too wide"))?;
        let height = i32::try_from(dimensions.height)
            .map_err(|_| PhotoError::ConstraintViolation("image is too tall"))?;
        let content_type = upload
            .content_type
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let id = Uuid::new_v4();
        let original_key = SizeClass::Original.storage_key(&id.to_string());
        self.store
            .put(&self.bucket, &original_key, upload.bytes.clone(), &content_type)
            .await?;

        let stored = join_all(
            SizeClass::DERIVATIVES
                .into_iter()
                .map(|size| self.store_derivative(&original_key, size, upload.bytes.clone())),
        )
        .await;
        let derivatives = stored.into_iter().filter(|ok| *ok).count();

        self.photos
            .create_photo(NewPhoto {
                id,
                description: upload.description.filter(|value| !value.is_empty()),
                width,
                height,
                content_type,
            })
            .await?;

        info!(
            target = "vitrine::admin::photos",
            photo_id = %id,
            width,
            height,
            derivatives,
            "photo uploaded"
        );
        Ok(id)
    }

    pub async fn update(
        &self,
        id: Uuid,
        changes: PhotoChanges,
    ) -> Result<AdminPhotoSummary, PhotoError> {
        let record = self
            .photos
            .update_photo(id, changes)
            .await
            .map_err(not_found_as_photo)?;
        self.summary(record).await
    }

    /// Delete a photo unless an album still uses it as its banner.
    pub async fn delete(&self, id: Uuid) -> Result<(), PhotoError> {
        if let Some(album) = self.albums.find_album_with_banner(id).await? {
            return Err(PhotoError::BannerInUse { album: album.name });
        }
        self.photos
            .delete_photo(id)
            .await
            .map_err(not_found_as_photo)?;
        info!(target = "vitrine::admin::photos", photo_id = %id, "photo deleted");
        Ok(())
    }

    async fn summary(&self, record: PhotoRecord) -> Result<AdminPhotoSummary, PhotoError> {
        let url = self
            .resolver
            .resolve(&record.id.to_string(), SizeClass::Original)
            .await?;
        Ok(AdminPhotoSummary {
            id: record.id,
            description: record.description,
            is_visible: record.is_visible,
            url,
            created_at: record.created_at,
        })
    }

    async fn store_derivative(&self, original_key: &str, size: SizeClass, bytes: Bytes) -> bool {
        let Some(max_dimension) = size.max_dimension() else {
            return false;
        };
        let key = size.storage_key(original_key);

        let resized = match self.resizer.resize(bytes, max_dimension).await {
            Ok(resized) => resized,
            Err(err) => {
                counter!(METRIC_DERIVATIVE_FAILED, "size" => size.as_str()).increment(1);
                warn!(
                    target = "vitrine::admin::photos",
                    key = %key,
                    error = %err,
                    "derivative could not be rendered"
                );
                return false;
            }
        };

        match self
            .store
            .put(&self.bucket, &key, resized, DERIVATIVE_CONTENT_TYPE)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                counter!(METRIC_DERIVATIVE_FAILED, "size" => size.as_str()).increment(1);
                warn!(
                    target = "vitrine::admin::photos",
                    key = %key,
                    error = %err,
                    "derivative could not be stored"
                );
                false
            }
        }
    }
}

fn not_found_as_photo(err: RepoError) -> PhotoError {
    match err {
        RepoError::NotFound => PhotoError::NotFound,
        other => PhotoError::Repo(other),
    }
}
