//! Public photo listing and detail.

use std::sync::Arc;

use futures::future::try_join_all;
use thiserror::Error;
use uuid::Uuid;
use vitrine_api_types::{PhotoDetailResponse, PhotoListResponse, PhotoNavigation, PhotoSummary};

use crate::application::media::ImageVariantResolver;
use crate::application::repos::{PhotoScope, PhotosRepo, RepoError};
use crate::domain::types::SizeClass;
use crate::infra::imaging::ImagingError;
use crate::infra::storage::ObjectStoreError;

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("No more photos available")]
    NoMorePhotos,
    #[error("photo not found")]
    NotFound,
    #[error("{0}")]
    ConstraintViolation(&'static str),
    #[error("photo is the banner of album `{album}`")]
    BannerInUse { album: String },
    #[error(transparent)]
    Imaging(#[from] ImagingError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Store(#[from] ObjectStoreError),
}

/// Reject an offset past the end of a non-empty listing. The first page of an empty gallery
/// is always served.
pub(crate) fn ensure_page_exists(skip: u64, total: u64) -> Result<(), PhotoError> {
    if skip > 0 && skip >= total {
        return Err(PhotoError::NoMorePhotos);
    }
    Ok(())
}

#[derive(Clone)]
pub struct PhotoService {
    repo: Arc<dyn PhotosRepo>,
    resolver: ImageVariantResolver,
    page_size: u64,
}

impl PhotoService {
    pub fn new(repo: Arc<dyn PhotosRepo>, resolver: ImageVariantResolver, page_size: u64) -> Self {
        Self {
            repo,
            resolver,
            page_size: page_size.max(1),
        }
    }

    /// One page of visible photos, newest first, with `medium` renditions.
    pub async fn list(&self, skip: u64) -> Result<PhotoListResponse, PhotoError> {
        let total = self.repo.count_photos(PhotoScope::Visible).await?;
        ensure_page_exists(skip, total)?;

        let records = self
            .repo
            .list_photos(PhotoScope::Visible, skip, self.page_size)
            .await?;
        let photos = try_join_all(records.into_iter().map(|record| async move {
            let url = self
                .resolver
                .resolve(&record.id.to_string(), SizeClass::Medium)
                .await?;
            Ok::<_, PhotoError>(PhotoSummary {
                id: record.id,
                description: record.description,
                is_visible: record.is_visible,
                url,
            })
        }))
        .await?;

        Ok(PhotoListResponse {
            has_remaining: skip.saturating_add(self.page_size) < total,
            photos,
        })
    }

    pub async fn detail(&self, id: Uuid) -> Result<PhotoDetailResponse, PhotoError> {
        let photo = self
            .repo
            .find_visible_photo(id)
            .await?
            .ok_or(PhotoError::NotFound)?;
        let neighbours = self.repo.find_neighbours(photo.created_at).await?;
        let url = self
            .resolver
            .resolve(&photo.id.to_string(), SizeClass::Original)
            .await?;

        Ok(PhotoDetailResponse {
            id: photo.id,
            description: photo.description,
            likes: photo.likes,
            created_at: photo.created_at,
            url,
            navigation: PhotoNavigation {
                next_photo: neighbours.next,
                previous_photo: neighbours.previous,
            },
        })
    }
}
