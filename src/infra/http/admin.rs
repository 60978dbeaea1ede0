//! Administrative JSON API, served on its own listener.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    middleware,
    response::Response,
    routing::{get, patch, post},
};
use bytes::Bytes;
use serde::Deserialize;
use uuid::Uuid;
use vitrine_api_types::{
    AdminAlbumResponse, AdminPhotoListResponse, AdminPhotoSummary, AlbumCreateRequest,
    AlbumPatchRequest, MessageResponse, PhotoPatchRequest, PhotoUploadResponse,
    ProfilePatchRequest, ProfileResponse, ProfileUploadResponse, UploadUrlResponse,
};

use crate::{
    application::{
        admin::{
            AdminAlbumService, AdminPhotoService, AdminProfileService, CreateAlbumCommand,
            PhotoUpload,
        },
        photos::PhotoError,
        repos::{AlbumChanges, HealthRepo, PhotoChanges, ProfileChanges},
    },
    domain::entities::AlbumRecord,
};

use super::{
    SkipQuery, db_health_response,
    error::{ApiError, album_to_api, photo_to_api, profile_to_api},
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct AdminState {
    pub profile: Arc<AdminProfileService>,
    pub photos: Arc<AdminPhotoService>,
    pub albums: Arc<AdminAlbumService>,
    pub health: Arc<dyn HealthRepo>,
}

pub fn build_admin_router(state: AdminState, upload_body_limit: usize) -> Router {
    Router::new()
        .route("/api/admin/profile", patch(update_profile))
        .route(
            "/api/admin/profile/upload",
            post(upload_profile_picture).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route("/api/admin/profile/upload-url", get(profile_upload_url))
        .route("/api/admin/photos", get(list_photos))
        .route(
            "/api/admin/photos/upload",
            post(upload_photo).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route(
            "/api/admin/photos/{id}",
            patch(update_photo).delete(delete_photo),
        )
        .route("/api/admin/albums", get(list_albums).post(create_album))
        .route(
            "/api/admin/albums/{id}",
            patch(update_album).delete(delete_album),
        )
        .route("/_health/db", get(admin_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

/// File part of a multipart upload plus any text fields that came with it.
#[derive(Debug, Default)]
struct UploadForm {
    filename: Option<String>,
    content_type: Option<String>,
    data: Option<Bytes>,
    description: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await.map_err(|err| {
            ApiError::bad_request("invalid multipart payload", Some(err.to_string()))
        })? {
            match field.name() {
                Some("file") => {
                    form.filename = field.file_name().map(str::to_string);
                    form.content_type = field.content_type().map(str::to_string);
                    form.data = Some(field.bytes().await.map_err(|err| {
                        ApiError::bad_request("failed to read upload", Some(err.to_string()))
                    })?);
                }
                Some("description") => {
                    form.description = Some(field.text().await.map_err(|err| {
                        ApiError::bad_request("failed to read description", Some(err.to_string()))
                    })?);
                }
                _ => {}
            }
        }

        Ok(form)
    }

    /// Declared content type, else a guess from the file name.
    fn resolved_content_type(&self) -> Option<String> {
        self.content_type
            .clone()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| {
                self.filename
                    .as_deref()
                    .and_then(|name| mime_guess::from_path(name).first())
                    .map(|mime| mime.essence_str().to_string())
            })
    }
}

fn parse_id(raw: &str, missing: ApiError) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| missing)
}

async fn update_profile(
    State(state): State<AdminState>,
    Json(payload): Json<ProfilePatchRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let view = state
        .profile
        .update(ProfileChanges {
            description: payload.description,
            photo_key: payload.photo,
        })
        .await
        .map_err(|err| profile_to_api("infra::http::admin::update_profile", err))?;

    Ok(Json(ProfileResponse {
        description: view.description,
        photo_proxy: view.photo_proxy,
    }))
}

async fn upload_profile_picture(
    State(state): State<AdminState>,
    multipart: Multipart,
) -> Result<Json<ProfileUploadResponse>, ApiError> {
    let form = UploadForm::read(multipart).await?;
    let content_type = form.resolved_content_type();
    let data = form.data.unwrap_or_default();

    let key = state
        .profile
        .store_picture(form.filename.as_deref(), content_type.as_deref(), data)
        .await
        .map_err(|err| profile_to_api("infra::http::admin::upload_profile_picture", err))?;

    Ok(Json(ProfileUploadResponse { key }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UploadUrlQuery {
    filename: Option<String>,
}

async fn profile_upload_url(
    State(state): State<AdminState>,
    Query(query): Query<UploadUrlQuery>,
) -> Result<Json<UploadUrlResponse>, ApiError> {
    let ticket = state
        .profile
        .upload_url(query.filename.as_deref())
        .map_err(|err| profile_to_api("infra::http::admin::profile_upload_url", err))?;

    Ok(Json(UploadUrlResponse {
        url: ticket.url,
        key: ticket.key,
    }))
}

async fn list_photos(
    State(state): State<AdminState>,
    Query(query): Query<SkipQuery>,
) -> Result<Json<AdminPhotoListResponse>, ApiError> {
    state
        .photos
        .list(query.offset())
        .await
        .map(Json)
        .map_err(|err| photo_to_api("infra::http::admin::list_photos", err))
}

async fn upload_photo(
    State(state): State<AdminState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<PhotoUploadResponse>), ApiError> {
    let form = UploadForm::read(multipart).await?;
    let content_type = form.resolved_content_type();
    let Some(bytes) = form.data.filter(|data| !data.is_empty()) else {
        return Err(ApiError::bad_request("No file provided", None));
    };

    let photo_id = state
        .photos
        .upload(PhotoUpload {
            description: form.description.filter(|text| !text.trim().is_empty()),
            content_type,
            bytes,
        })
        .await
        .map_err(|err| photo_to_api("infra::http::admin::upload_photo", err))?;

    Ok((StatusCode::CREATED, Json(PhotoUploadResponse { photo_id })))
}

async fn update_photo(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(payload): Json<PhotoPatchRequest>,
) -> Result<Json<AdminPhotoSummary>, ApiError> {
    const SOURCE: &str = "infra::http::admin::update_photo";

    let id = parse_id(&id, photo_to_api(SOURCE, PhotoError::NotFound))?;
    state
        .photos
        .update(
            id,
            PhotoChanges {
                description: payload.description,
                is_visible: payload.is_visible,
            },
        )
        .await
        .map(Json)
        .map_err(|err| photo_to_api(SOURCE, err))
}

async fn delete_photo(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    const SOURCE: &str = "infra::http::admin::delete_photo";

    let id = parse_id(&id, photo_to_api(SOURCE, PhotoError::NotFound))?;
    state
        .photos
        .delete(id)
        .await
        .map_err(|err| photo_to_api(SOURCE, err))?;

    Ok(Json(MessageResponse {
        message: "Photo deleted".to_string(),
    }))
}

fn album_response(record: AlbumRecord) -> AdminAlbumResponse {
    AdminAlbumResponse {
        id: record.id,
        name: record.name,
        banner_id: record.banner_id,
        photo_count: record.photo_count,
        created_at: record.created_at,
    }
}

async fn list_albums(
    State(state): State<AdminState>,
) -> Result<Json<Vec<AdminAlbumResponse>>, ApiError> {
    let albums = state
        .albums
        .list()
        .await
        .map_err(|err| album_to_api("infra::http::admin::list_albums", err))?;

    Ok(Json(albums.into_iter().map(album_response).collect()))
}

async fn create_album(
    State(state): State<AdminState>,
    Json(payload): Json<AlbumCreateRequest>,
) -> Result<(StatusCode, Json<AdminAlbumResponse>), ApiError> {
    let album = state
        .albums
        .create(CreateAlbumCommand {
            name: payload.album_name,
            banner_id: payload.banner_id,
            photo_ids: payload.photo_ids,
        })
        .await
        .map_err(|err| album_to_api("infra::http::admin::create_album", err))?;

    Ok((StatusCode::CREATED, Json(album_response(album))))
}

async fn update_album(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(payload): Json<AlbumPatchRequest>,
) -> Result<Json<AdminAlbumResponse>, ApiError> {
    let id = parse_id(&id, ApiError::not_found("Album not found"))?;
    let album = state
        .albums
        .update(
            id,
            AlbumChanges {
                name: payload.name,
                banner_id: payload.banner_id,
                photo_ids: payload.photo_ids,
            },
        )
        .await
        .map_err(|err| album_to_api("infra::http::admin::update_album", err))?;

    Ok(Json(album_response(album)))
}

async fn delete_album(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id, ApiError::not_found("Album not found"))?;
    state
        .albums
        .delete(id)
        .await
        .map_err(|err| album_to_api("infra::http::admin::delete_album", err))?;

    Ok(Json(MessageResponse {
        message: "Album deleted".to_string(),
    }))
}

async fn admin_health(State(state): State<AdminState>) -> Response {
    db_health_response(state.health.health_check().await)
}
