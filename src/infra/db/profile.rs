use async_trait::async_trait;

use crate::{
    application::repos::{ProfileChanges, ProfileRepo, RepoError},
    domain::entities::ProfileRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct ProfileRow {
    description: Option<String>,
    photo_key: Option<String>,
}

impl From<ProfileRow> for ProfileRecord {
    fn from(row: ProfileRow) -> Self {
        Self {
            description: row.description,
            photo_key: row.photo_key,
        }
    }
}

#[async_trait]
impl ProfileRepo for PostgresRepositories {
    async fn find_first_profile(&self) -> Result<Option<ProfileRecord>, RepoError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT description, photo_key
            FROM profile
            WHERE id = 1
            "#,
        )
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ProfileRecord::from))
    }

    async fn upsert_profile(&self, changes: ProfileChanges) -> Result<ProfileRecord, RepoError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            INSERT INTO profile (id, description, photo_key, updated_at)
            VALUES (1, $1, $2, now())
            ON CONFLICT (id) DO UPDATE SET
                description = COALESCE(EXCLUDED.description, profile.description),
                photo_key = COALESCE(EXCLUDED.photo_key, profile.photo_key),
                updated_at = EXCLUDED.updated_at
            RETURNING description, photo_key
            "#,
        )
        .bind(changes.description)
        .bind(changes.photo_key)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(ProfileRecord::from(row))
    }
}
