//! Public album listing and detail.

use std::sync::Arc;

use futures::future::try_join_all;
use thiserror::Error;
use uuid::Uuid;
use vitrine_api_types::{AlbumDetailResponse, AlbumPhoto, AlbumSummary};

use crate::application::media::ImageVariantResolver;
use crate::application::repos::{AlbumsRepo, RepoError};
use crate::domain::types::SizeClass;
use crate::infra::storage::ObjectStoreError;

#[derive(Debug, Error)]
pub enum AlbumError {
    #[error("album not found")]
    NotFound,
    #[error("{0}")]
    ConstraintViolation(&'static str),
    #[error("an album named `{name}` already exists")]
    DuplicateName { name: String },
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Store(#[from] ObjectStoreError),
}

#[derive(Clone)]
pub struct AlbumService {
    repo: Arc<dyn AlbumsRepo>,
    resolver: ImageVariantResolver,
}

impl AlbumService {
    pub fn new(repo: Arc<dyn AlbumsRepo>, resolver: ImageVariantResolver) -> Self {
        Self { repo, resolver }
    }

    /// Every album, newest first. Albums without a banner get an empty banner URL.
    pub async fn list(&self) -> Result<Vec<AlbumSummary>, AlbumError> {
        let albums = self.repo.list_albums().await?;
        try_join_all(albums.into_iter().map(|album| async move {
            let banner_url = self.banner_url(album.banner_id, SizeClass::Original).await?;
            Ok::<_, AlbumError>(AlbumSummary {
                id: album.id,
                name: album.name,
                banner_id: album.banner_id,
                banner_url,
            })
        }))
        .await
    }

    pub async fn detail(&self, id: Uuid) -> Result<AlbumDetailResponse, AlbumError> {
        let album = self
            .repo
            .find_album(id)
            .await?
            .ok_or(AlbumError::NotFound)?;
        let banner_url = self.banner_url(album.banner_id, SizeClass::Large).await?;
        let photos = try_join_all(album.photo_ids.iter().map(|photo_id| async move {
            let url = self
                .resolver
                .resolve(&photo_id.to_string(), SizeClass::Medium)
                .await?;
            Ok::<_, AlbumError>(AlbumPhoto { id: *photo_id, url })
        }))
        .await?;

        Ok(AlbumDetailResponse {
            name: album.name,
            banner_id: album.banner_id,
            banner_url,
            photos,
        })
    }

    async fn banner_url(
        &self,
        banner_id: Option<Uuid>,
        size: SizeClass,
    ) -> Result<String, AlbumError> {
        match banner_id {
            Some(id) => Ok(self.resolver.resolve(&id.to_string(), size).await?),
            None => Ok(String::new()),
        }
    }
}
