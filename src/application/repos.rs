//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{
    AlbumDetailRecord, AlbumRecord, PhotoDetailRecord, PhotoNeighbours, PhotoRecord,
    ProfileRecord,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Fields written by a profile update. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub description: Option<String>,
    pub photo_key: Option<String>,
}

#[async_trait]
pub trait ProfileRepo: Send + Sync {
    async fn find_first_profile(&self) -> Result<Option<ProfileRecord>, RepoError>;

    /// Create the profile if it does not exist yet, otherwise update it in place.
    async fn upsert_profile(&self, changes: ProfileChanges) -> Result<ProfileRecord, RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub id: Uuid,
    pub description: Option<String>,
    pub width: i32,
    pub height: i32,
    pub content_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct PhotoChanges {
    pub description: Option<String>,
    pub is_visible: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoScope {
    Visible,
    All,
}

#[async_trait]
pub trait PhotosRepo: Send + Sync {
    async fn count_photos(&self, scope: PhotoScope) -> Result<u64, RepoError>;

    /// Photos ordered newest first.
    async fn list_photos(
        &self,
        scope: PhotoScope,
        skip: u64,
        take: u64,
    ) -> Result<Vec<PhotoRecord>, RepoError>;

    async fn find_visible_photo(&self, id: Uuid) -> Result<Option<PhotoDetailRecord>, RepoError>;

    async fn find_neighbours(&self, created_at: OffsetDateTime)
    -> Result<PhotoNeighbours, RepoError>;

    async fn create_photo(&self, photo: NewPhoto) -> Result<PhotoRecord, RepoError>;

    async fn update_photo(&self, id: Uuid, changes: PhotoChanges)
    -> Result<PhotoRecord, RepoError>;

    /// Remove the photo, its metadata, its rating and every album membership.
    async fn delete_photo(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewAlbum {
    pub name: String,
    pub banner_id: Uuid,
    pub photo_ids: Vec<Uuid>,
}

/// Album update. The member set is always replaced by `photo_ids`.
#[derive(Debug, Clone, Default)]
pub struct AlbumChanges {
    pub name: Option<String>,
    pub banner_id: Option<Uuid>,
    pub photo_ids: Vec<Uuid>,
}

#[async_trait]
pub trait AlbumsRepo: Send + Sync {
    /// Albums ordered newest first.
    async fn list_albums(&self) -> Result<Vec<AlbumRecord>, RepoError>;

    async fn find_album(&self, id: Uuid) -> Result<Option<AlbumDetailRecord>, RepoError>;

    async fn find_album_by_name(&self, name: &str) -> Result<Option<AlbumRecord>, RepoError>;

    async fn find_album_with_banner(
        &self,
        photo_id: Uuid,
    ) -> Result<Option<AlbumRecord>, RepoError>;

    async fn create_album(&self, album: NewAlbum) -> Result<AlbumRecord, RepoError>;

    async fn update_album(&self, id: Uuid, changes: AlbumChanges)
    -> Result<AlbumRecord, RepoError>;

    async fn delete_album(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn health_check(&self) -> Result<(), RepoError>;
}
