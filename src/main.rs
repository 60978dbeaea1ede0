use std::{net::SocketAddr, process, sync::Arc};

use tokio::{net::TcpListener, sync::watch, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use vitrine::{
    application::{
        admin::{AdminAlbumService, AdminPhotoService, AdminProfileService},
        albums::AlbumService,
        error::AppError,
        media::ImageVariantResolver,
        photos::PhotoService,
        profile::ProfileService,
        repos::{AlbumsRepo, HealthRepo, PhotosRepo, ProfileRepo},
    },
    cache::{CacheConfig, Clock, ImageCache, ProfileCache, SystemClock},
    config::{self, StorageBackend, StorageSettings},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, HttpState},
        imaging::{ImageCrateResizer, ImageResizer},
        storage::{FsObjectStore, MemoryObjectStore, ObjectStore, UrlSigner},
        telemetry,
    },
    live::{BroadcastChannel, ListenerChannel, ProfileNotifier, ProfileUpdate, UpdateChannel},
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let causes = error.causes();
    if dispatcher::has_been_set() {
        error!(error = %error, ?causes, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, ?causes, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn connect_database(settings: &config::Settings) -> Result<PostgresRepositories, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or(InfraError::MissingDatabaseUrl)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::Connect)?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::Migrate)?;

    Ok(PostgresRepositories::new(pool))
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    connect_database(&settings).await?;
    info!("database migrations applied");
    Ok(())
}

fn build_object_store(
    storage: &StorageSettings,
) -> Result<(Arc<dyn ObjectStore>, Arc<UrlSigner>), AppError> {
    let signer = UrlSigner::new(&storage.signing_secret, storage.public_base_url.clone());
    let store: Arc<dyn ObjectStore> = match storage.backend {
        StorageBackend::Filesystem => Arc::new(
            FsObjectStore::new(storage.root.clone(), signer.clone()).map_err(|source| {
                InfraError::StorageRoot {
                    root: storage.root.clone(),
                    source,
                }
            })?,
        ),
        StorageBackend::Memory => {
            warn!("using in-memory object storage; uploads are lost on restart");
            Arc::new(MemoryObjectStore::new(signer.clone()))
        }
    };
    Ok((store, Arc::new(signer)))
}

fn build_notifier() -> (Arc<ProfileNotifier>, Arc<BroadcastChannel>) {
    let listeners = Arc::new(ListenerChannel::new());
    listeners.add_listener(Box::new(|update: &ProfileUpdate| {
        info!(
            target = "vitrine::live",
            has_photo = update.photo_url.is_some(),
            has_description = update.description.is_some(),
            "profile updated"
        );
        Ok(())
    }));
    let broadcast = Arc::new(BroadcastChannel::new());

    let channels: Vec<Arc<dyn UpdateChannel>> = vec![listeners, broadcast.clone()];
    (Arc::new(ProfileNotifier::new(channels)), broadcast)
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = Arc::new(connect_database(&settings).await?);
    let (store, signer) = build_object_store(&settings.storage)?;
    let bucket = settings.storage.bucket.clone();
    let url_ttl = settings.storage.signed_url_ttl;

    let profile_repo: Arc<dyn ProfileRepo> = repositories.clone();
    let photos_repo: Arc<dyn PhotosRepo> = repositories.clone();
    let albums_repo: Arc<dyn AlbumsRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories.clone();

    let cache_config = CacheConfig::from(&settings.cache);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let profile_cache = Arc::new(ProfileCache::new(
        profile_repo.clone(),
        clock.clone(),
        cache_config.profile_ttl,
    ));
    let image_cache = Arc::new(ImageCache::new(
        store.clone(),
        bucket.clone(),
        clock,
        cache_config.image_ttl,
    ));
    let (notifier, broadcast) = build_notifier();

    let resolver = ImageVariantResolver::new(store.clone(), bucket.clone(), url_ttl);
    let resizer: Arc<dyn ImageResizer> = Arc::new(ImageCrateResizer);

    let http_state = HttpState {
        profile: Arc::new(ProfileService::new(
            profile_cache.clone(),
            image_cache.clone(),
        )),
        photos: Arc::new(PhotoService::new(
            photos_repo.clone(),
            resolver.clone(),
            u64::from(settings.gallery.page_size.get()),
        )),
        albums: Arc::new(AlbumService::new(albums_repo.clone(), resolver.clone())),
        broadcast,
        store: store.clone(),
        signer,
        bucket: bucket.clone(),
        health: health_repo.clone(),
    };

    let admin_state = AdminState {
        profile: Arc::new(AdminProfileService::new(
            profile_repo,
            profile_cache,
            image_cache,
            notifier,
            store.clone(),
            bucket.clone(),
            url_ttl,
        )),
        photos: Arc::new(AdminPhotoService::new(
            photos_repo,
            albums_repo.clone(),
            store,
            resizer,
            resolver,
            bucket,
            u64::from(settings.gallery.admin_page_size.get()),
        )),
        albums: Arc::new(AdminAlbumService::new(albums_repo)),
        health: health_repo,
    };

    serve_http(&settings, http_state, admin_state).await
}

async fn serve_http(
    settings: &config::Settings,
    http_state: HttpState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let upload_body_limit = usize::try_from(settings.uploads.max_request_bytes.get())
        .unwrap_or(usize::MAX);
    let public_router = http::build_router(http_state);
    let admin_router = http::build_admin_router(admin_state, upload_body_limit);

    let public_listener = bind(settings.server.public_addr).await?;
    let admin_listener = bind(settings.server.admin_addr).await?;
    info!(
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx));

    let servers = async move { try_join!(public_server, admin_server) };
    tokio::pin!(servers);

    let result = tokio::select! {
        result = &mut servers => result,
        () = shutdown_signal() => {
            info!("shutdown requested, draining connections");
            let _ = shutdown_tx.send(true);
            match tokio::time::timeout(settings.server.graceful_shutdown, &mut servers).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        timeout_secs = settings.server.graceful_shutdown.as_secs(),
                        "graceful shutdown timed out"
                    );
                    return Ok(());
                }
            }
        }
    };

    result.map_err(InfraError::Serve)?;
    Ok(())
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, InfraError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| InfraError::Bind { addr, source })
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.changed().await;
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
