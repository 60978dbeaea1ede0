use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{NewPhoto, PhotoChanges, PhotoScope, PhotosRepo, RepoError},
    domain::entities::{PhotoDetailRecord, PhotoNeighbours, PhotoRecord},
};

use super::{
    PostgresRepositories, map_sqlx_error,
    util::{count_to_u64, u64_to_bigint},
};

#[derive(sqlx::FromRow)]
struct PhotoRow {
    id: Uuid,
    description: Option<String>,
    is_visible: bool,
    created_at: Option<OffsetDateTime>,
}

impl From<PhotoRow> for PhotoRecord {
    fn from(row: PhotoRow) -> Self {
        Self {
            id: row.id,
            description: row.description,
            is_visible: row.is_visible,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PhotoDetailRow {
    id: Uuid,
    description: Option<String>,
    likes: i32,
    created_at: OffsetDateTime,
}

impl From<PhotoDetailRow> for PhotoDetailRecord {
    fn from(row: PhotoDetailRow) -> Self {
        Self {
            id: row.id,
            description: row.description,
            likes: row.likes,
            created_at: row.created_at,
        }
    }
}

fn visible_only(scope: PhotoScope) -> bool {
    matches!(scope, PhotoScope::Visible)
}

#[async_trait]
impl PhotosRepo for PostgresRepositories {
    async fn count_photos(&self, scope: PhotoScope) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM photos p
            WHERE ($1 = FALSE OR p.is_visible)
            "#,
        )
        .bind(visible_only(scope))
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        count_to_u64(count)
    }

    async fn list_photos(
        &self,
        scope: PhotoScope,
        skip: u64,
        take: u64,
    ) -> Result<Vec<PhotoRecord>, RepoError> {
        let rows = sqlx::query_as::<_, PhotoRow>(
            r#"
            SELECT p.id, p.description, p.is_visible, m.created_at
            FROM photos p
            LEFT JOIN photo_metadata m ON m.photo_id = p.id
            WHERE ($1 = FALSE OR p.is_visible)
            ORDER BY m.created_at DESC NULLS LAST, p.id
            OFFSET $2
            LIMIT $3
            "#,
        )
        .bind(visible_only(scope))
        .bind(u64_to_bigint(skip)?)
        .bind(u64_to_bigint(take)?)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PhotoRecord::from).collect())
    }

    async fn find_visible_photo(&self, id: Uuid) -> Result<Option<PhotoDetailRecord>, RepoError> {
        let row = sqlx::query_as::<_, PhotoDetailRow>(
            r#"
            SELECT p.id, p.description, COALESCE(r.likes, 0) AS likes, m.created_at
            FROM photos p
            JOIN photo_metadata m ON m.photo_id = p.id
            LEFT JOIN photo_ratings r ON r.photo_id = p.id
            WHERE p.id = $1 AND p.is_visible
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PhotoDetailRecord::from))
    }

    async fn find_neighbours(
        &self,
        created_at: OffsetDateTime,
    ) -> Result<PhotoNeighbours, RepoError> {
        let next: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT p.id
            FROM photos p
            JOIN photo_metadata m ON m.photo_id = p.id
            WHERE p.is_visible AND m.created_at < $1
            ORDER BY m.created_at DESC
            LIMIT 1
            "#,
        )
        .bind(created_at)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let previous: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT p.id
            FROM photos p
            JOIN photo_metadata m ON m.photo_id = p.id
            WHERE p.is_visible AND m.created_at > $1
            ORDER BY m.created_at ASC
            LIMIT 1
            "#,
        )
        .bind(created_at)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(PhotoNeighbours { next, previous })
    }

    async fn create_photo(&self, photo: NewPhoto) -> Result<PhotoRecord, RepoError> {
        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO photos (id, description, is_visible)
            VALUES ($1, $2, TRUE)
            "#,
        )
        .bind(photo.id)
        .bind(photo.description.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let created_at: OffsetDateTime = sqlx::query_scalar(
            r#"
            INSERT INTO photo_metadata (photo_id, width, height, content_type)
            VALUES ($1, $2, $3, $4)
            RETURNING created_at
            "#,
        )
        .bind(photo.id)
        .bind(photo.width)
        .bind(photo.height)
        .bind(&photo.content_type)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO photo_ratings (photo_id, likes)
            VALUES ($1, 0)
            "#,
        )
        .bind(photo.id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(PhotoRecord {
            id: photo.id,
            description: photo.description,
            is_visible: true,
            created_at: Some(created_at),
        })
    }

    async fn update_photo(
        &self,
        id: Uuid,
        changes: PhotoChanges,
    ) -> Result<PhotoRecord, RepoError> {
        let row = sqlx::query_as::<_, PhotoRow>(
            r#"
            UPDATE photos
            SET description = COALESCE($2, description),
                is_visible = COALESCE($3, is_visible)
            WHERE id = $1
            RETURNING id,
                      description,
                      is_visible,
                      (SELECT created_at FROM photo_metadata WHERE photo_id = photos.id) AS created_at
            "#,
        )
        .bind(id)
        .bind(changes.description)
        .bind(changes.is_visible)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(PhotoRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_photo(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await?;

        for statement in [
            "DELETE FROM album_photos WHERE photo_id = $1",
            "DELETE FROM photo_metadata WHERE photo_id = $1",
            "DELETE FROM photo_ratings WHERE photo_id = $1",
        ] {
            sqlx::query(statement)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        let deleted = sqlx::query("DELETE FROM photos WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();
        if deleted == 0 {
            return Err(RepoError::NotFound);
        }

        tx.commit().await.map_err(map_sqlx_error)
    }
}
