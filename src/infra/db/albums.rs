use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{AlbumChanges, AlbumsRepo, NewAlbum, RepoError},
    domain::entities::{AlbumDetailRecord, AlbumRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

const ALBUM_SELECT: &str = r#"
    SELECT a.id,
           a.name,
           a.banner_id,
           a.created_at,
           COUNT(ap.photo_id) AS photo_count
    FROM albums a
    LEFT JOIN album_photos ap ON ap.album_id = a.id
"#;

#[derive(sqlx::FromRow)]
struct AlbumRow {
    id: Uuid,
    name: String,
    banner_id: Option<Uuid>,
    created_at: OffsetDateTime,
    photo_count: i64,
}

impl From<AlbumRow> for AlbumRecord {
    fn from(row: AlbumRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            banner_id: row.banner_id,
            photo_count: row.photo_count,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AlbumHeadRow {
    id: Uuid,
    name: String,
    banner_id: Option<Uuid>,
    created_at: OffsetDateTime,
}

impl AlbumHeadRow {
    fn with_count(self, photo_count: i64) -> AlbumRecord {
        AlbumRecord {
            id: self.id,
            name: self.name,
            banner_id: self.banner_id,
            photo_count,
            created_at: self.created_at,
        }
    }
}

async fn replace_members(
    tx: &mut Transaction<'_, Postgres>,
    album_id: Uuid,
    photo_ids: &[Uuid],
) -> Result<i64, RepoError> {
    sqlx::query("DELETE FROM album_photos WHERE album_id = $1")
        .bind(album_id)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

    if photo_ids.is_empty() {
        return Ok(0);
    }

    let inserted = sqlx::query(
        r#"
        INSERT INTO album_photos (album_id, photo_id)
        SELECT $1, photo_id FROM UNNEST($2::uuid[]) AS t(photo_id)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(album_id)
    .bind(photo_ids)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx_error)?
    .rows_affected();

    i64::try_from(inserted).map_err(|_| RepoError::from_persistence("member count overflow"))
}

#[async_trait]
impl AlbumsRepo for PostgresRepositories {
    async fn list_albums(&self) -> Result<Vec<AlbumRecord>, RepoError> {
        let sql = format!("{ALBUM_SELECT} GROUP BY a.id ORDER BY a.created_at DESC");
        let rows = sqlx::query_as::<_, AlbumRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(AlbumRecord::from).collect())
    }

    async fn find_album(&self, id: Uuid) -> Result<Option<AlbumDetailRecord>, RepoError> {
        let Some(head) = sqlx::query_as::<_, AlbumHeadRow>(
            r#"
            SELECT id, name, banner_id, created_at
            FROM albums
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        else {
            return Ok(None);
        };

        let photo_ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT ap.photo_id
            FROM album_photos ap
            LEFT JOIN photo_metadata m ON m.photo_id = ap.photo_id
            WHERE ap.album_id = $1
            ORDER BY m.created_at DESC NULLS LAST, ap.photo_id
            "#,
        )
        .bind(id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(Some(AlbumDetailRecord {
            id: head.id,
            name: head.name,
            banner_id: head.banner_id,
            photo_ids,
        }))
    }

    async fn find_album_by_name(&self, name: &str) -> Result<Option<AlbumRecord>, RepoError> {
        let sql = format!("{ALBUM_SELECT} WHERE a.name = $1 GROUP BY a.id");
        let row = sqlx::query_as::<_, AlbumRow>(&sql)
            .bind(name)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(AlbumRecord::from))
    }

    async fn find_album_with_banner(
        &self,
        photo_id: Uuid,
    ) -> Result<Option<AlbumRecord>, RepoError> {
        let sql = format!(
            "{ALBUM_SELECT} WHERE a.banner_id = $1 GROUP BY a.id ORDER BY a.created_at LIMIT 1"
        );
        let row = sqlx::query_as::<_, AlbumRow>(&sql)
            .bind(photo_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(AlbumRecord::from))
    }

    async fn create_album(&self, album: NewAlbum) -> Result<AlbumRecord, RepoError> {
        let mut tx = self.begin().await?;

        let head = sqlx::query_as::<_, AlbumHeadRow>(
            r#"
            INSERT INTO albums (id, name, banner_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, banner_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&album.name)
        .bind(album.banner_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let photo_count = replace_members(&mut tx, head.id, &album.photo_ids).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(head.with_count(photo_count))
    }

    async fn update_album(
        &self,
        id: Uuid,
        changes: AlbumChanges,
    ) -> Result<AlbumRecord, RepoError> {
        let mut tx = self.begin().await?;

        let head = sqlx::query_as::<_, AlbumHeadRow>(
            r#"
            UPDATE albums
            SET name = COALESCE($2, name),
                banner_id = COALESCE($3, banner_id)
            WHERE id = $1
            RETURNING id, name, banner_id, created_at
            "#,
        )
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.banner_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        let photo_count = replace_members(&mut tx, id, &changes.photo_ids).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(head.with_count(photo_count))
    }

    async fn delete_album(&self, id: Uuid) -> Result<(), RepoError> {
        let deleted = sqlx::query("DELETE FROM albums WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        if deleted == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
