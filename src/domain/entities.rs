//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// The single site profile.
///
/// At most one profile exists; a missing row reads as the empty profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileRecord {
    pub description: Option<String>,
    pub photo_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhotoRecord {
    pub id: Uuid,
    pub description: Option<String>,
    pub is_visible: bool,
    pub created_at: Option<OffsetDateTime>,
}

/// A visible photo together with its rating and creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhotoDetailRecord {
    pub id: Uuid,
    pub description: Option<String>,
    pub likes: i32,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhotoMetadataRecord {
    pub photo_id: Uuid,
    pub width: i32,
    pub height: i32,
    pub content_type: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhotoNeighbours {
    /// Next older visible photo.
    pub next: Option<Uuid>,
    /// Next newer visible photo.
    pub previous: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlbumRecord {
    pub id: Uuid,
    pub name: String,
    pub banner_id: Option<Uuid>,
    pub photo_count: i64,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlbumDetailRecord {
    pub id: Uuid,
    pub name: String,
    pub banner_id: Option<Uuid>,
    /// Member photos, newest first.
    pub photo_ids: Vec<Uuid>,
}
