//! Filesystem object store.
//!
//! Objects live at `<root>/<bucket>/<key>`; declared content types are kept next to them under
//! `<root>/.meta/<bucket>/<key>` so keys never collide with metadata files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::{fs, io::AsyncWriteExt};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use super::{
    ByteSource, ObjectBody, ObjectStore, ObjectStoreError, SignedMethod, UrlSigner, validate_key,
};

const META_DIR: &str = ".meta";

#[derive(Debug)]
pub struct FsObjectStore {
    root: PathBuf,
    signer: UrlSigner,
}

impl FsObjectStore {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf, signer: UrlSigner) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, signer })
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, ObjectStoreError> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        Ok(self.root.join(bucket).join(key))
    }

    fn meta_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(META_DIR).join(bucket).join(key)
    }

    async fn read_content_type(&self, bucket: &str, key: &str) -> Option<String> {
        match fs::read_to_string(self.meta_path(bucket, key)).await {
            Ok(value) => {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Err(_) => None,
        }
    }
}

fn validate_bucket(bucket: &str) -> Result<(), ObjectStoreError> {
    if bucket.is_empty() || bucket == META_DIR || bucket.contains(['/', '\\']) || bucket == ".."
    {
        return Err(ObjectStoreError::InvalidKey(bucket.to_string()));
    }
    Ok(())
}

async fn write_atomically(path: &Path, body: &[u8]) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let staging = path.with_file_name(format!(
        ".{}.{}.part",
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("object"),
        Uuid::new_v4().simple()
    ));

    let mut file = fs::File::create(&staging).await?;
    if let Err(err) = file.write_all(body).await {
        drop(file);
        let _ = fs::remove_file(&staging).await;
        return Err(err);
    }
    file.flush().await?;
    drop(file);

    fs::rename(&staging, path).await
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<ObjectBody, ObjectStoreError> {
        let path = self.object_path(bucket, key)?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ObjectStoreError::not_found(bucket, key));
            }
            Err(err) => return Err(ObjectStoreError::Io(err)),
        };

        let content_type = self.read_content_type(bucket, key).await;
        if file.metadata().await?.len() == 0 {
            return Ok(ObjectBody {
                body: None,
                content_type,
            });
        }

        let stream = ReaderStream::new(file).map(|chunk| chunk.map_err(ObjectStoreError::Io));
        Ok(ObjectBody {
            body: Some(ByteSource::Stream(stream.boxed())),
            content_type,
        })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let path = self.object_path(bucket, key)?;
        write_atomically(&path, &body).await?;
        write_atomically(&self.meta_path(bucket, key), content_type.as_bytes()).await?;
        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, ObjectStoreError> {
        let path = self.object_path(bucket, key)?;
        match fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(ObjectStoreError::Io(err)),
        }
    }

    fn signed_url(
        &self,
        bucket: &str,
        key: &str,
        method: SignedMethod,
        ttl: Duration,
    ) -> Result<String, ObjectStoreError> {
        self.object_path(bucket, key)?;
        self.signer.signed_url(bucket, key, method, ttl)
    }
}
