use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::application::albums::AlbumError;
use crate::application::repos::{AlbumChanges, AlbumsRepo, NewAlbum, RepoError};
use crate::domain::entities::AlbumRecord;

#[derive(Debug, Clone, Default)]
pub struct CreateAlbumCommand {
    pub name: Option<String>,
    pub banner_id: Option<Uuid>,
    pub photo_ids: Vec<Uuid>,
}

#[derive(Clone)]
pub struct AdminAlbumService {
    repo: Arc<dyn AlbumsRepo>,
}

impl AdminAlbumService {
    pub fn new(repo: Arc<dyn AlbumsRepo>) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> Result<Vec<AlbumRecord>, AlbumError> {
        Ok(self.repo.list_albums().await?)
    }

    pub async fn create(&self, command: CreateAlbumCommand) -> Result<AlbumRecord, AlbumError> {
        let name = command
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        let (Some(name), Some(banner_id)) = (name, command.banner_id) else {
            return Err(AlbumError::ConstraintViolation(
                "album name and banner are required",
            ));
        };

        if self.repo.find_album_by_name(&name).await?.is_some() {
            return Err(AlbumError::DuplicateName { name });
        }

        let album = self
            .repo
            .create_album(NewAlbum {
                name: name.clone(),
                banner_id,
                photo_ids: command.photo_ids,
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => AlbumError::DuplicateName { name },
                other => AlbumError::Repo(other),
            })?;

        info!(target = "vitrine::admin::albums", album_id = %album.id, "album created");
        Ok(album)
    }

    /// Apply `changes`. An empty name keeps the stored one; the photo set is always replaced.
    pub async fn update(
        &self,
        id: Uuid,
        mut changes: AlbumChanges,
    ) -> Result<AlbumRecord, AlbumError> {
        changes.name = changes
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        let renamed = changes.name.clone();

        self.repo
            .update_album(id, changes)
            .await
            .map_err(|err| match (err, renamed) {
                (RepoError::NotFound, _) => AlbumError::NotFound,
                (RepoError::Duplicate { .. }, Some(name)) => AlbumError::DuplicateName { name },
                (other, _) => AlbumError::Repo(other),
            })
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AlbumError> {
        self.repo.delete_album(id).await.map_err(|err| match err {
            RepoError::NotFound => AlbumError::NotFound,
            other => AlbumError::Repo(other),
        })?;
        info!(target = "vitrine::admin::albums", album_id = %id, "album deleted");
        Ok(())
    }
}
