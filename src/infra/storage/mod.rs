//! Object storage for photo and profile picture bytes.
//!
//! Objects are addressed by `(bucket, key)`. Backends hand bodies back as a [`ByteSource`] so
//! callers can normalize buffered, streamed and raw payloads through one conversion.

mod fs;
mod memory;
mod signing;

use std::error::Error as StdError;
use std::fmt;
use std::path::{Component, Path};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, stream::BoxStream};
use slug::slugify;
use thiserror::Error;

pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;
pub use signing::{SignatureError, SignedMethod, SignedRequest, UrlSigner};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("object body stream failed")]
    Stream {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("failed to sign object url: {0}")]
    Signing(String),
}

impl ObjectStoreError {
    pub fn not_found(bucket: &str, key: &str) -> Self {
        Self::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

/// Body of a fetched object in whatever shape the backend produced it.
pub enum ByteSource {
    Buffer(Bytes),
    Stream(BoxStream<'static, Result<Bytes, ObjectStoreError>>),
    Raw(Vec<u8>),
}

impl ByteSource {
    /// Collapse the body into a single contiguous buffer.
    pub async fn into_bytes(self) -> Result<Bytes, ObjectStoreError> {
        match self {
            ByteSource::Buffer(bytes) => Ok(bytes),
            ByteSource::Raw(raw) => Ok(Bytes::from(raw)),
            ByteSource::Stream(mut stream) => {
                let mut buffer = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buffer.extend_from_slice(&chunk?);
                }
                Ok(buffer.freeze())
            }
        }
    }
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteSource::Buffer(bytes) => f.debug_tuple("Buffer").field(&bytes.len()).finish(),
            ByteSource::Stream(_) => f.write_str("Stream(..)"),
            ByteSource::Raw(raw) => f.debug_tuple("Raw").field(&raw.len()).finish(),
        }
    }
}

/// Result of a `get`: the body may be absent even when the object exists.
#[derive(Debug)]
pub struct ObjectBody {
    pub body: Option<ByteSource>,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> Result<ObjectBody, ObjectStoreError>;

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError>;

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, ObjectStoreError>;

    /// Issue a URL granting `method` on the object until `ttl` elapses.
    fn signed_url(
        &self,
        bucket: &str,
        key: &str,
        method: SignedMethod,
        ttl: Duration,
    ) -> Result<String, ObjectStoreError>;
}

/// Reject keys that could escape the bucket once mapped onto a path.
pub fn validate_key(key: &str) -> Result<(), ObjectStoreError> {
    let path = Path::new(key);
    if key.is_empty()
        || key.contains('\\')
        || path.is_absolute()
        || path.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::CurDir | Component::Prefix(_) | Component::RootDir
            )
        })
    {
        return Err(ObjectStoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Reduce a client supplied filename to a safe `slug.ext` form.
pub fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("upload");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "upload".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty());

    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}
