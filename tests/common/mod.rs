//! Shared harness for the HTTP integration tests: in-memory repositories, an in-memory object
//! store and both routers wired the same way `main` wires them.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header::CONTENT_TYPE},
    response::Response,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use image::{ImageBuffer, ImageFormat, Rgb};
use serde_json::Value;
use time::OffsetDateTime;
use tower::ServiceExt;
use url::Url;
use uuid::Uuid;
use vitrine::{
    application::{
        admin::{AdminAlbumService, AdminPhotoService, AdminProfileService},
        albums::AlbumService,
        media::ImageVariantResolver,
        photos::PhotoService,
        profile::ProfileService,
        repos::{
            AlbumChanges, AlbumsRepo, HealthRepo, NewAlbum, NewPhoto, PhotoChanges, PhotoScope,
            PhotosRepo, ProfileChanges, ProfileRepo, RepoError,
        },
    },
    cache::{Clock, ImageCache, ManualClock, ProfileCache},
    domain::entities::{
        AlbumDetailRecord, AlbumRecord, PhotoDetailRecord, PhotoNeighbours, PhotoRecord,
        ProfileRecord,
    },
    infra::{
        http::{AdminState, HttpState, build_admin_router, build_router},
        imaging::{ImageCrateResizer, ImageResizer},
        storage::{MemoryObjectStore, ObjectStore, UrlSigner},
    },
    live::{BroadcastChannel, ListenerChannel, ProfileNotifier, ProfileUpdate, UpdateChannel},
};

pub const BUCKET: &str = "photos";
pub const BASE_URL: &str = "http://gallery.test";
pub const SECRET: &str = "integration-secret";
pub const PAGE_SIZE: u64 = 2;
pub const MULTIPART_BOUNDARY: &str = "vitrine-test-boundary";

#[derive(Debug, Clone)]
struct StoredPhoto {
    record: PhotoRecord,
    likes: i32,
}

#[derive(Debug, Clone)]
struct StoredAlbum {
    id: Uuid,
    name: String,
    banner_id: Option<Uuid>,
    photo_ids: Vec<Uuid>,
    created_at: OffsetDateTime,
}

impl StoredAlbum {
    fn record(&self) -> AlbumRecord {
        AlbumRecord {
            id: self.id,
            name: self.name.clone(),
            banner_id: self.banner_id,
            photo_count: self.photo_ids.len() as i64,
            created_at: self.created_at,
        }
    }
}

/// Repositories backed by plain vectors. Timestamps advance one minute per insert so ordering
/// is deterministic.
#[derive(Debug)]
pub struct InMemoryGallery {
    profile: Mutex<Option<ProfileRecord>>,
    photos: Mutex<Vec<StoredPhoto>>,
    albums: Mutex<Vec<StoredAlbum>>,
    ticks: AtomicUsize,
    profile_reads: AtomicUsize,
}

impl Default for InMemoryGallery {
    fn default() -> Self {
        Self {
            profile: Mutex::new(None),
            photos: Mutex::new(Vec::new()),
            albums: Mutex::new(Vec::new()),
            ticks: AtomicUsize::new(0),
            profile_reads: AtomicUsize::new(0),
        }
    }
}

impl InMemoryGallery {
    fn next_timestamp(&self) -> OffsetDateTime {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) as i64;
        OffsetDateTime::from_unix_timestamp(1_714_564_800 + tick * 60).expect("valid timestamp")
    }

    pub fn profile_reads(&self) -> usize {
        self.profile_reads.load(Ordering::SeqCst)
    }

    /// Insert a photo record directly, skipping the upload pipeline.
    pub fn seed_photo(&self, description: &str, is_visible: bool) -> Uuid {
        let id = Uuid::new_v4();
        let created_at = self.next_timestamp();
        self.photos.lock().expect("photos lock").push(StoredPhoto {
            record: PhotoRecord {
                id,
                description: Some(description.to_string()),
                is_visible,
                created_at: Some(created_at),
            },
            likes: 0,
        });
        id
    }

    fn sorted_photos(&self, scope: PhotoScope) -> Vec<PhotoRecord> {
        let mut photos: Vec<PhotoRecord> = self
            .photos
            .lock()
            .expect("photos lock")
            .iter()
            .filter(|photo| scope == PhotoScope::All || photo.record.is_visible)
            .map(|photo| photo.record.clone())
            .collect();
        photos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        photos
    }
}

#[async_trait]
impl ProfileRepo for InMemoryGallery {
    async fn find_first_profile(&self) -> Result<Option<ProfileRecord>, RepoError> {
        self.profile_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.profile.lock().expect("profile lock").clone())
    }

    async fn upsert_profile(&self, changes: ProfileChanges) -> Result<ProfileRecord, RepoError> {
        let mut profile = self.profile.lock().expect("profile lock");
        let current = profile.get_or_insert_with(ProfileRecord::default);
        if let Some(description) = changes.description {
            current.description = Some(description);
        }
        if let Some(photo_key) = changes.photo_key {
            current.photo_key = Some(photo_key);
        }
        Ok(current.clone())
    }
}

#[async_trait]
impl PhotosRepo for InMemoryGallery {
    async fn count_photos(&self, scope: PhotoScope) -> Result<u64, RepoError> {
        Ok(self.sorted_photos(scope).len() as u64)
    }

    async fn list_photos(
        &self,
        scope: PhotoScope,
        skip: u64,
        take: u64,
    ) -> Result<Vec<PhotoRecord>, RepoError> {
        Ok(self
            .sorted_photos(scope)
            .into_iter()
            .skip(skip as usize)
            .take(take as usize)
            .collect())
    }

    async fn find_visible_photo(&self, id: Uuid) -> Result<Option<PhotoDetailRecord>, RepoError> {
        let photos = self.photos.lock().expect("photos lock");
        Ok(photos
            .iter()
            .find(|photo| photo.record.id == id && photo.record.is_visible)
            .and_then(|photo| {
                photo.record.created_at.map(|created_at| PhotoDetailRecord {
                    id: photo.record.id,
                    description: photo.record.description.clone(),
                    likes: photo.likes,
                    created_at,
                })
            }))
    }

    async fn find_neighbours(
        &self,
        created_at: OffsetDateTime,
    ) -> Result<PhotoNeighbours, RepoError> {
        let visible = self.sorted_photos(PhotoScope::Visible);
        let next = visible
            .iter()
            .find(|photo| photo.created_at.is_some_and(|at| at < created_at))
            .map(|photo| photo.id);
        let previous = visible
            .iter()
            .rev()
            .find(|photo| photo.created_at.is_some_and(|at| at > created_at))
            .map(|photo| photo.id);
        Ok(PhotoNeighbours { next, previous })
    }

    async fn create_photo(&self, photo: NewPhoto) -> Result<PhotoRecord, RepoError> {
        let record = PhotoRecord {
            id: photo.id,
            description: photo.description,
            is_visible: true,
            created_at: Some(self.next_timestamp()),
        };
        self.photos.lock().expect("photos lock").push(StoredPhoto {
            record: record.clone(),
            likes: 0,
        });
        Ok(record)
    }

    async fn update_photo(
        &self,
        id: Uuid,
        changes: PhotoChanges,
    ) -> Result<PhotoRecord, RepoError> {
        let mut photos = self.photos.lock().expect("photos lock");
        let photo = photos
            .iter_mut()
            .find(|photo| photo.record.id == id)
            .ok_or(RepoError::NotFound)?;
        if let Some(description) = changes.description {
            photo.record.description = Some(description);
        }
        if let Some(is_visible) = changes.is_visible {
            photo.record.is_visible = is_visible;
        }
        Ok(photo.record.clone())
    }

    async fn delete_photo(&self, id: Uuid) -> Result<(), RepoError> {
        let mut photos = self.photos.lock().expect("photos lock");
        let before = photos.len();
        photos.retain(|photo| photo.record.id != id);
        if photos.len() == before {
            return Err(RepoError::NotFound);
        }
        for album in self.albums.lock().expect("albums lock").iter_mut() {
            album.photo_ids.retain(|member| *member != id);
        }
        Ok(())
    }
}

fn dedup(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}

#[async_trait]
impl AlbumsRepo for InMemoryGallery {
    async fn list_albums(&self) -> Result<Vec<AlbumRecord>, RepoError> {
        let mut albums: Vec<AlbumRecord> = self
            .albums
            .lock()
            .expect("albums lock")
            .iter()
            .map(StoredAlbum::record)
            .collect();
        albums.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(albums)
    }

    async fn find_album(&self, id: Uuid) -> Result<Option<AlbumDetailRecord>, RepoError> {
        let album = self
            .albums
            .lock()
            .expect("albums lock")
            .iter()
            .find(|album| album.id == id)
            .cloned();
        let Some(album) = album else {
            return Ok(None);
        };

        let order = self.sorted_photos(PhotoScope::All);
        let photo_ids = order
            .iter()
            .map(|photo| photo.id)
            .filter(|id| album.photo_ids.contains(id))
            .collect();
        Ok(Some(AlbumDetailRecord {
            id: album.id,
            name: album.name,
            banner_id: album.banner_id,
            photo_ids,
        }))
    }

    async fn find_album_by_name(&self, name: &str) -> Result<Option<AlbumRecord>, RepoError> {
        Ok(self
            .albums
            .lock()
            .expect("albums lock")
            .iter()
            .find(|album| album.name == name)
            .map(StoredAlbum::record))
    }

    async fn find_album_with_banner(
        &self,
        photo_id: Uuid,
    ) -> Result<Option<AlbumRecord>, RepoError> {
        Ok(self
            .albums
            .lock()
            .expect("albums lock")
            .iter()
            .find(|album| album.banner_id == Some(photo_id))
            .map(StoredAlbum::record))
    }

    async fn create_album(&self, album: NewAlbum) -> Result<AlbumRecord, RepoError> {
        let created_at = self.next_timestamp();
        let mut albums = self.albums.lock().expect("albums lock");
        if albums.iter().any(|existing| existing.name == album.name) {
            return Err(RepoError::Duplicate {
                constraint: "albums_name_key".to_string(),
            });
        }
        let stored = StoredAlbum {
            id: Uuid::new_v4(),
            name: album.name,
            banner_id: Some(album.banner_id),
            photo_ids: dedup(album.photo_ids),
            created_at,
        };
        let record = stored.record();
        albums.push(stored);
        Ok(record)
    }

    async fn update_album(
        &self,
        id: Uuid,
        changes: AlbumChanges,
    ) -> Result<AlbumRecord, RepoError> {
        let mut albums = self.albums.lock().expect("albums lock");
        let taken = changes.name.as_deref().is_some_and(|name| {
            albums
                .iter()
                .any(|existing| existing.id != id && existing.name == name)
        });
        if taken {
            return Err(RepoError::Duplicate {
                constraint: "albums_name_key".to_string(),
            });
        }
        let album = albums
            .iter_mut()
            .find(|album| album.id == id)
            .ok_or(RepoError::NotFound)?;
        if let Some(name) = changes.name {
            album.name = name;
        }
        if let Some(banner_id) = changes.banner_id {
            album.banner_id = Some(banner_id);
        }
        album.photo_ids = dedup(changes.photo_ids);
        Ok(album.record())
    }

    async fn delete_album(&self, id: Uuid) -> Result<(), RepoError> {
        let mut albums = self.albums.lock().expect("albums lock");
        let before = albums.len();
        albums.retain(|album| album.id != id);
        if albums.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl HealthRepo for InMemoryGallery {
    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

pub struct TestApp {
    pub public: Router,
    pub admin: Router,
    pub gallery: Arc<InMemoryGallery>,
    pub store: Arc<MemoryObjectStore>,
    pub signer: UrlSigner,
    pub clock: Arc<ManualClock>,
    pub broadcast: Arc<BroadcastChannel>,
    pub notified: Arc<AtomicUsize>,
}

pub fn signer() -> UrlSigner {
    UrlSigner::new(SECRET, Url::parse(BASE_URL).expect("base url"))
}

impl TestApp {
    pub fn new() -> Self {
        let gallery = Arc::new(InMemoryGallery::default());
        let signer = signer();
        let store = Arc::new(MemoryObjectStore::new(signer.clone()));
        let object_store: Arc<dyn ObjectStore> = store.clone();
        let clock = Arc::new(ManualClock::new());
        let shared_clock: Arc<dyn Clock> = clock.clone();
        let url_ttl = Duration::from_secs(3600);

        let profile_cache = Arc::new(ProfileCache::new(
            gallery.clone(),
            shared_clock.clone(),
            Duration::from_secs(30),
        ));
        let image_cache = Arc::new(ImageCache::new(
            object_store.clone(),
            BUCKET,
            shared_clock,
            Duration::from_secs(3600),
        ));

        let notified = Arc::new(AtomicUsize::new(0));
        let listeners = Arc::new(ListenerChannel::new());
        let counter = notified.clone();
        listeners.add_listener(Box::new(move |_: &ProfileUpdate| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        let broadcast = Arc::new(BroadcastChannel::new());
        let channels: Vec<Arc<dyn UpdateChannel>> = vec![listeners, broadcast.clone()];
        let notifier = Arc::new(ProfileNotifier::new(channels));

        let resolver = ImageVariantResolver::new(object_store.clone(), BUCKET, url_ttl);
        let resizer: Arc<dyn ImageResizer> = Arc::new(ImageCrateResizer);

        let public = build_router(HttpState {
            profile: Arc::new(ProfileService::new(
                profile_cache.clone(),
                image_cache.clone(),
            )),
            photos: Arc::new(PhotoService::new(
                gallery.clone(),
                resolver.clone(),
                PAGE_SIZE,
            )),
            albums: Arc::new(AlbumService::new(gallery.clone(), resolver.clone())),
            broadcast: broadcast.clone(),
            store: object_store.clone(),
            signer: Arc::new(signer.clone()),
            bucket: BUCKET.to_string(),
            health: gallery.clone(),
        });

        let admin = build_admin_router(
            AdminState {
                profile: Arc::new(AdminProfileService::new(
                    gallery.clone(),
                    profile_cache,
                    image_cache,
                    notifier,
                    object_store.clone(),
                    BUCKET,
                    url_ttl,
                )),
                photos: Arc::new(AdminPhotoService::new(
                    gallery.clone(),
                    gallery.clone(),
                    object_store,
                    resizer,
                    resolver,
                    BUCKET,
                    PAGE_SIZE,
                )),
                albums: Arc::new(AdminAlbumService::new(gallery.clone())),
                health: gallery.clone(),
            },
            10 * 1024 * 1024,
        );

        Self {
            public,
            admin,
            gallery,
            store,
            signer,
            clock,
            broadcast,
            notified,
        }
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond")
}

pub async fn body_bytes(response: Response) -> Bytes {
    response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes()
}

pub async fn json_body(response: Response) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build")
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build")
}

pub fn json_request(method: Method, uri: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request should build")
}

/// One-file multipart form, optionally with a `description` text field.
pub fn multipart_upload(
    uri: &str,
    filename: &str,
    content_type: &str,
    data: &[u8],
    description: Option<&str>,
) -> Request<Body> {
    let mut body = Vec::new();
    if let Some(description) = description {
        body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"description\"\r\n\r\n{description}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request should build")
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128u8])
    });
    let mut encoded = Cursor::new(Vec::new());
    image
        .write_to(&mut encoded, ImageFormat::Png)
        .expect("encode png");
    encoded.into_inner()
}

/// Path and query of an absolute signed URL, ready to send to the public router.
pub fn local_path(url: &str) -> String {
    let parsed = Url::parse(url).expect("absolute url");
    match parsed.query() {
        Some(query) => format!("{}?{query}", parsed.path()),
        None => parsed.path().to_string(),
    }
}

pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected, "unexpected status");
}
