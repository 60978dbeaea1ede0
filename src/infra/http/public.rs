use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;
use vitrine_api_types::{
    AlbumDetailResponse, AlbumSummary, PhotoDetailResponse, PhotoListResponse, ProfileResponse,
};

use crate::{
    application::{
        albums::AlbumService,
        photos::{PhotoError, PhotoService},
        profile::{ProfileService, ProfileView},
        repos::HealthRepo,
    },
    cache::ImageCacheError,
    infra::storage::{
        DEFAULT_CONTENT_TYPE, ObjectStore, SignedMethod, SignedRequest, UrlSigner,
    },
    live::{BroadcastChannel, ProfileUpdate},
};

use super::{
    SkipQuery, db_health_response,
    error::{
        ApiError, album_to_api, codes, image_cache_to_api, photo_to_api, profile_to_api,
        signature_to_api, store_to_api,
    },
    live::{into_sse, profile_stream},
    middleware::{log_responses, set_request_context},
};

const PROFILE_PHOTO_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

#[derive(Clone)]
pub struct HttpState {
    pub profile: Arc<ProfileService>,
    pub photos: Arc<PhotoService>,
    pub albums: Arc<AlbumService>,
    pub broadcast: Arc<BroadcastChannel>,
    pub store: Arc<dyn ObjectStore>,
    pub signer: Arc<UrlSigner>,
    pub bucket: String,
    pub health: Arc<dyn HealthRepo>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/api/profile", get(profile))
        .route("/api/profile/photo", get(profile_photo))
        .route("/api/profile/live", get(profile_live))
        .route("/api/photos", get(list_photos))
        .route("/api/photos/{id}", get(photo_detail))
        .route("/api/albums", get(list_albums))
        .route("/api/albums/{id}", get(album_detail))
        .route(
            "/media/{bucket}/{*key}",
            get(media_download).put(media_upload),
        )
        .route("/_health/db", get(public_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PhotoKeyQuery {
    key: Option<String>,
}

fn header_value(content_type: &str) -> HeaderValue {
    HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE))
}

async fn profile(State(state): State<HttpState>) -> Result<Json<ProfileResponse>, ApiError> {
    let view = state
        .profile
        .load()
        .await
        .map_err(|err| profile_to_api("infra::http::public::profile", err))?;

    Ok(Json(ProfileResponse {
        description: view.description,
        photo_proxy: view.photo_proxy,
    }))
}

async fn profile_photo(
    State(state): State<HttpState>,
    Query(query): Query<PhotoKeyQuery>,
) -> Result<Response, ApiError> {
    let key = query.key.unwrap_or_default();
    let image = state
        .profile
        .photo(&key)
        .await
        .map_err(|err| profile_to_api("infra::http::public::profile_photo", err))?;

    Ok((
        [
            (CONTENT_TYPE, header_value(&image.content_type)),
            (
                CACHE_CONTROL,
                HeaderValue::from_static(PROFILE_PHOTO_CACHE_CONTROL),
            ),
        ],
        image.bytes,
    )
        .into_response())
}

async fn profile_live(State(state): State<HttpState>) -> Response {
    // Subscribe before loading so no update slips in between.
    let updates = state.broadcast.subscribe();
    let initial = match state.profile.load().await {
        Ok(view) => Some(update_from_view(view)),
        Err(err) => {
            warn!(error = %err, "live stream opened without the current profile");
            None
        }
    };

    into_sse(profile_stream(initial, updates)).into_response()
}

fn update_from_view(view: ProfileView) -> ProfileUpdate {
    ProfileUpdate {
        photo_url: view.photo_proxy,
        description: view.description,
    }
}

async fn list_photos(
    State(state): State<HttpState>,
    Query(query): Query<SkipQuery>,
) -> Result<Json<PhotoListResponse>, ApiError> {
    state
        .photos
        .list(query.offset())
        .await
        .map(Json)
        .map_err(|err| photo_to_api("infra::http::public::list_photos", err))
}

async fn photo_detail(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<PhotoDetailResponse>, ApiError> {
    const SOURCE: &str = "infra::http::public::photo_detail";

    let id = Uuid::parse_str(&id).map_err(|_| photo_to_api(SOURCE, PhotoError::NotFound))?;
    state
        .photos
        .detail(id)
        .await
        .map(Json)
        .map_err(|err| photo_to_api(SOURCE, err))
}

async fn list_albums(State(state): State<HttpState>) -> Result<Json<Vec<AlbumSummary>>, ApiError> {
    state
        .albums
        .list()
        .await
        .map(Json)
        .map_err(|err| album_to_api("infra::http::public::list_albums", err))
}

async fn album_detail(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<AlbumDetailResponse>, ApiError> {
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::not_found("Album not found"))?;
    state
        .albums
        .detail(id)
        .await
        .map(Json)
        .map_err(|err| album_to_api("infra::http::public::album_detail", err))
}

fn verify_media_request(
    state: &HttpState,
    bucket: &str,
    key: &str,
    method: SignedMethod,
    query: Result<Query<SignedRequest>, QueryRejection>,
) -> Result<(), ApiError> {
    if bucket != state.bucket {
        return Err(ApiError::not_found("Object not found"));
    }
    let Query(request) = query.map_err(|rejection| {
        ApiError::new(
            StatusCode::FORBIDDEN,
            codes::INVALID_SIGNATURE,
            "Signed URL is not valid",
            Some(rejection.body_text()),
        )
    })?;

    state
        .signer
        .verify(bucket, key, method, &request, OffsetDateTime::now_utc())
        .map_err(signature_to_api)
}

async fn media_download(
    State(state): State<HttpState>,
    Path((bucket, key)): Path<(String, String)>,
    query: Result<Query<SignedRequest>, QueryRejection>,
) -> Result<Response, ApiError> {
    const SOURCE: &str = "infra::http::public::media_download";

    verify_media_request(&state, &bucket, &key, SignedMethod::Get, query)?;

    let object = state
        .store
        .get(&bucket, &key)
        .await
        .map_err(|err| store_to_api(SOURCE, err))?;
    let body = object.body.ok_or_else(|| {
        image_cache_to_api(
            SOURCE,
            ImageCacheError::NoContent {
                key: format!("{bucket}/{key}"),
            },
        )
    })?;
    let bytes = body
        .into_bytes()
        .await
        .map_err(|err| store_to_api(SOURCE, err))?;
    let content_type = object
        .content_type
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    Ok(([(CONTENT_TYPE, header_value(&content_type))], bytes).into_response())
}

async fn media_upload(
    State(state): State<HttpState>,
    Path((bucket, key)): Path<(String, String)>,
    query: Result<Query<SignedRequest>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    const SOURCE: &str = "infra::http::public::media_upload";

    verify_media_request(&state, &bucket, &key, SignedMethod::Put, query)?;

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| {
            mime_guess::from_path(&key)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });
    let size = body.len();

    state
        .store
        .put(&bucket, &key, body, &content_type)
        .await
        .map_err(|err| store_to_api(SOURCE, err))?;

    info!(bucket = %bucket, key = %key, size, "object uploaded through signed url");
    Ok(StatusCode::OK)
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.health_check().await)
}
