use std::error::Error as StdError;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::albums::AlbumError;
use crate::application::error::ErrorReport;
use crate::application::photos::PhotoError;
use crate::application::profile::ProfileError;
use crate::application::repos::RepoError;
use crate::cache::ImageCacheError;
use crate::infra::imaging::ImagingError;
use crate::infra::storage::{ObjectStoreError, SignatureError};

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const NOT_FOUND: &str = "not_found";
    pub const DUPLICATE: &str = "duplicate";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INTEGRITY: &str = "integrity_error";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
    pub const STORAGE: &str = "storage_error";
    pub const NO_CONTENT: &str = "no_content";
    pub const NO_MORE_PHOTOS: &str = "no_more_photos";
    pub const BANNER_IN_USE: &str = "banner_in_use";
    pub const INVALID_IMAGE: &str = "invalid_image";
    pub const INVALID_SIGNATURE: &str = "invalid_signature";
    pub const SIGNATURE_EXPIRED: &str = "signature_expired";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    report: Option<ErrorReport>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            report: None,
        }
    }

    /// Server side failure: the client only sees `message`, the log gets the whole chain.
    pub fn internal(
        source: &'static str,
        code: &'static str,
        message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        Self {
            status,
            code,
            message,
            hint: None,
            report: Some(ErrorReport::from_error(source, status, error)),
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = self.report.unwrap_or_else(|| {
            ErrorReport::from_message(
                "infra::http::api",
                self.status,
                format!(
                    "{}: {}",
                    self.code,
                    self.hint.as_deref().unwrap_or(self.message)
                ),
            )
        });
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}

pub fn repo_to_api(source: &'static str, err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::NotFound => ApiError::not_found("Resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        err @ RepoError::Persistence(_) => {
            ApiError::internal(source, codes::REPO, "Persistence error", &err)
        }
    }
}

pub fn store_to_api(source: &'static str, err: ObjectStoreError) -> ApiError {
    match err {
        ObjectStoreError::NotFound { .. } => ApiError::not_found("Object not found"),
        ObjectStoreError::InvalidKey(key) => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid object key",
            Some(key),
        ),
        other => ApiError::internal(source, codes::STORAGE, "Object storage error", &other),
    }
}

pub fn image_cache_to_api(source: &'static str, err: ImageCacheError) -> ApiError {
    match err {
        err @ ImageCacheError::NoContent { .. } => {
            ApiError::internal(source, codes::NO_CONTENT, "Failed to load photo", &err)
        }
        ImageCacheError::Store(store) => store_to_api(source, store),
    }
}

pub fn signature_to_api(err: SignatureError) -> ApiError {
    match err {
        SignatureError::Expired => ApiError::new(
            StatusCode::FORBIDDEN,
            codes::SIGNATURE_EXPIRED,
            "Signed URL has expired",
            None,
        ),
        other => ApiError::new(
            StatusCode::FORBIDDEN,
            codes::INVALID_SIGNATURE,
            "Signed URL is not valid",
            Some(other.to_string()),
        ),
    }
}

pub fn profile_to_api(source: &'static str, err: ProfileError) -> ApiError {
    match err {
        ProfileError::ConstraintViolation(message) => ApiError::bad_request(message, None),
        ProfileError::NotAPicture(_) => ApiError::not_found("Profile picture not found"),
        ProfileError::Repo(repo) => repo_to_api(source, repo),
        ProfileError::Image(image) => image_cache_to_api(source, image),
        ProfileError::Store(store) => store_to_api(source, store),
    }
}

pub fn photo_to_api(source: &'static str, err: PhotoError) -> ApiError {
    match err {
        PhotoError::NoMorePhotos => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::NO_MORE_PHOTOS,
            "No more photos available",
            None,
        ),
        PhotoError::NotFound => ApiError::not_found("Photo not found"),
        PhotoError::ConstraintViolation(message) => ApiError::bad_request(message, None),
        PhotoError::BannerInUse { album } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::BANNER_IN_USE,
            "Photo is an album banner",
            Some(format!(
                "remove it as the banner of album \"{album}\" before deleting"
            )),
        ),
        PhotoError::Imaging(err @ ImagingError::Worker(_)) => {
            ApiError::internal(source, codes::INVALID_IMAGE, "Image processing failed", &err)
        }
        PhotoError::Imaging(err) => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_IMAGE,
            "Image could not be processed",
            Some(err.to_string()),
        ),
        PhotoError::Repo(repo) => repo_to_api(source, repo),
        PhotoError::Store(store) => store_to_api(source, store),
    }
}

pub fn album_to_api(source: &'static str, err: AlbumError) -> ApiError {
    match err {
        AlbumError::NotFound => ApiError::not_found("Album not found"),
        AlbumError::ConstraintViolation(message) => ApiError::bad_request(message, None),
        AlbumError::DuplicateName { name } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "An album with this name already exists",
            Some(name),
        ),
        AlbumError::Repo(repo) => repo_to_api(source, repo),
        AlbumError::Store(store) => store_to_api(source, store),
    }
}
