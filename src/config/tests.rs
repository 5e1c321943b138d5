use super::*;

#[test]
fn defaults_select_memory_storage_with_cache() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.storage.backend, StorageBackend::Memory);
    assert!(!settings.storage.backend.is_durable());
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.store, CacheStoreKind::Memory);
    assert_eq!(settings.cache.ttl, Duration::from_secs(120));
    assert_eq!(settings.cache.snapshot_limit.get(), 50);
    assert_eq!(settings.cache.op_timeout, Duration::from_millis(250));
    assert_eq!(
        settings.timeline.operation_timeout,
        Some(Duration::from_secs(5))
    );
    assert_eq!(settings.logging.level, LevelFilter::INFO);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("info".to_string());
    raw.database.url = Some("postgres://from-file".to_string());

    let overrides = GlobalOverrides {
        log_level: Some("debug".to_string()),
        database_url: Some("postgres://from-cli".to_string()),
        storage_backend: Some("postgres".to_string()),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.storage.backend, StorageBackend::Postgres);
    assert!(settings.storage.backend.is_durable());
    assert_eq!(
        settings.database.url.as_deref(),
        Some("postgres://from-cli")
    );
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = GlobalOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn postgres_backend_requires_database_url() {
    let mut raw = RawSettings::default();
    raw.storage.backend = Some("postgres".to_string());
    raw.database.url = Some("   ".to_string());

    let err = Settings::from_raw(raw).expect_err("missing url must fail");
    assert!(matches!(err, LoadError::Invalid { key: "database.url", .. }));
}

#[test]
fn unknown_backend_is_rejected() {
    let mut raw = RawSettings::default();
    raw.storage.backend = Some("sqlite".to_string());

    let err = Settings::from_raw(raw).expect_err("unknown backend must fail");
    assert!(matches!(err, LoadError::Invalid { key: "storage.backend", .. }));
}

#[test]
fn redis_store_requires_url_only_when_enabled() {
    let mut raw = RawSettings::default();
    raw.cache.store = Some("redis".to_string());
    assert!(Settings::from_raw(raw.clone()).is_err());

    raw.cache.enabled = Some(false);
    assert!(Settings::from_raw(raw.clone()).is_ok());

    raw.cache.enabled = Some(true);
    raw.cache.redis_url = Some("redis://127.0.0.1:6379".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cache.store, CacheStoreKind::Redis);
}

#[test]
fn zero_sizes_are_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.snapshot_limit = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero snapshot limit must fail");
    assert!(matches!(err, LoadError::Invalid { key: "cache.snapshot_limit", .. }));

    let mut raw = RawSettings::default();
    raw.database.max_connections = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn zero_operation_timeout_disables_deadline() {
    let mut raw = RawSettings::default();
    raw.apply_overrides(&GlobalOverrides {
        operation_timeout_ms: Some(0),
        ..Default::default()
    });
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.timeline.operation_timeout.is_none());
}

#[test]
fn cache_op_timeout_is_overridable_but_never_unbounded() {
    let mut raw = RawSettings::default();
    raw.apply_overrides(&GlobalOverrides {
        cache_op_timeout_ms: Some(40),
        ..Default::default()
    });
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cache.op_timeout, Duration::from_millis(40));

    let mut raw = RawSettings::default();
    raw.cache.op_timeout_ms = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero cache timeout must fail");
    assert!(matches!(err, LoadError::Invalid { key: "cache.op_timeout_ms", .. }));
}

#[test]
fn cache_settings_convert_into_cache_config() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
    let config = crate::cache::CacheConfig::from(&settings.cache);

    assert_eq!(config.capacity, 10_000);
    assert_eq!(config.snapshot_limit, 50);
    assert!(config.populate_in_background);
    assert_eq!(config.op_timeout, settings.cache.op_timeout);
}

#[test]
fn parse_publish_arguments() {
    let args = CliArgs::parse_from([
        "murmur",
        "publish",
        "--author",
        "b1",
        "hello world",
        "--log-json",
        "true",
    ]);

    assert_eq!(args.overrides.log_json, Some(true));
    match args.command {
        Command::Publish(publish) => {
            assert_eq!(publish.author, "b1");
            assert_eq!(publish.text, "hello world");
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_follow_arguments() {
    let args = CliArgs::parse_from([
        "murmur",
        "--database-url",
        "postgres://example",
        "follow",
        "--follower",
        "a1",
        "--followee",
        "b1",
    ]);

    assert_eq!(
        args.overrides.database_url.as_deref(),
        Some("postgres://example")
    );
    match args.command {
        Command::Follow(follow) => {
            assert_eq!(follow.follower, "a1");
            assert_eq!(follow.followee, "b1");
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_feed_arguments() {
    let args = CliArgs::parse_from(["murmur", "feed", "a1", "--limit", "2"]);

    match args.command {
        Command::Feed(feed) => {
            assert_eq!(feed.user, "a1");
            assert_eq!(feed.limit, Some(2));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_migrate_command() {
    let args = CliArgs::parse_from(["murmur", "migrate"]);
    assert!(matches!(args.command, Command::Migrate));
}
