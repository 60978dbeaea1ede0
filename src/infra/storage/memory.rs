//! In-process object store backed by a concurrent map.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use super::{
    ByteSource, ObjectBody, ObjectStore, ObjectStoreError, SignedMethod, UrlSigner, validate_key,
};

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Option<Bytes>,
    content_type: Option<String>,
}

#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: DashMap<(String, String), StoredObject>,
    signer: UrlSigner,
    gets: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new(signer: UrlSigner) -> Self {
        Self {
            objects: DashMap::new(),
            signer,
            gets: AtomicUsize::new(0),
        }
    }

    /// Number of `get` calls served so far.
    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Store an object without a declared content type.
    pub fn insert_untyped(&self, bucket: &str, key: &str, body: Bytes) {
        self.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                bytes: Some(body),
                content_type: None,
            },
        );
    }

    /// Store an object whose reads come back without a body.
    pub fn insert_bodiless(&self, bucket: &str, key: &str, content_type: &str) {
        self.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                bytes: None,
                content_type: Some(content_type.to_string()),
            },
        );
    }

    pub fn remove(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .remove(&(bucket.to_string(), key.to_string()))
            .is_some()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<ObjectBody, ObjectStoreError> {
        validate_key(key)?;
        self.gets.fetch_add(1, Ordering::SeqCst);
        let object = self
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ObjectStoreError::not_found(bucket, key))?;

        Ok(ObjectBody {
            body: object.bytes.map(ByteSource::Buffer),
            content_type: object.content_type,
        })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        validate_key(key)?;
        self.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                bytes: Some(body),
                content_type: Some(content_type.to_string()),
            },
        );
        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, ObjectStoreError> {
        validate_key(key)?;
        Ok(self
            .objects
            .contains_key(&(bucket.to_string(), key.to_string())))
    }

    fn signed_url(
        &self,
        bucket: &str,
        key: &str,
        method: SignedMethod,
        ttl: Duration,
    ) -> Result<String, ObjectStoreError> {
        validate_key(key)?;
        self.signer.signed_url(bucket, key, method, ttl)
    }
}
