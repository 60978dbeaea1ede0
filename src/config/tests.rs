use super::*;

fn raw_with_secret() -> RawSettings {
    let mut raw = RawSettings::default();
    raw.storage.signing_secret = Some("test-secret".to_string());
    raw
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = raw_with_secret();
    raw.server.public_port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        public_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(raw_with_secret()).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), 3000);
    assert_eq!(settings.server.admin_addr.port(), 3001);
    assert_eq!(settings.cache.profile_ttl, Duration::from_secs(30));
    assert_eq!(settings.cache.image_ttl, Duration::from_secs(3600));
    assert_eq!(settings.storage.signed_url_ttl, Duration::from_secs(3600));
    assert_eq!(settings.storage.bucket, "photos");
    assert_eq!(settings.storage.backend, StorageBackend::Filesystem);
    assert_eq!(settings.gallery.page_size.get(), 20);
    assert_eq!(settings.gallery.admin_page_size.get(), 50);
    assert_eq!(settings.database.max_connections.get(), 8);
    assert_eq!(
        settings.uploads.max_request_bytes.get(),
        DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES
    );
}

#[test]
fn filesystem_backend_requires_signing_secret() {
    let err = Settings::from_raw(RawSettings::default()).expect_err("secret required");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "storage.signing_secret",
            ..
        }
    ));
}

#[test]
fn memory_backend_runs_without_secret() {
    let mut raw = RawSettings::default();
    raw.storage.backend = Some("memory".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.storage.backend, StorageBackend::Memory);
}

#[test]
fn zero_cache_ttl_is_rejected() {
    let mut raw = raw_with_secret();
    let overrides = ServeOverrides {
        cache_profile_ttl_seconds: Some(0),
        ..Default::default()
    };
    raw.apply_serve_overrides(&overrides);

    let err = Settings::from_raw(raw).expect_err("zero ttl");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.profile_ttl_seconds",
            ..
        }
    ));
}

#[test]
fn admin_listener_cannot_share_public_socket() {
    let mut raw = raw_with_secret();
    raw.server.public_port = Some(3005);
    raw.server.admin_port = Some(3005);

    let err = Settings::from_raw(raw).expect_err("shared socket");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "server.admin_port",
            ..
        }
    ));
}

#[test]
fn unknown_storage_backend_is_rejected() {
    let mut raw = raw_with_secret();
    raw.storage.backend = Some("s3".to_string());

    let err = Settings::from_raw(raw).expect_err("unknown backend");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "storage.backend",
            ..
        }
    ));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = raw_with_secret();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["vitrine"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_migrate_arguments() {
    let args = CliArgs::parse_from(["vitrine", "migrate", "--database-url", "postgres://example"]);

    match args.command.expect("migrate command") {
        Command::Migrate(migrate) => {
            assert_eq!(
                migrate.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "vitrine",
        "serve",
        "--storage-backend",
        "memory",
        "--cache-image-ttl-seconds",
        "120",
        "--gallery-page-size",
        "10",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            let mut raw = RawSettings::default();
            raw.apply_serve_overrides(&serve.overrides);
            let settings = Settings::from_raw(raw).expect("valid settings");
            assert_eq!(settings.storage.backend, StorageBackend::Memory);
            assert_eq!(settings.cache.image_ttl, Duration::from_secs(120));
            assert_eq!(settings.gallery.page_size.get(), 10);
        }
        _ => panic!("wrong command parsed"),
    }
}
