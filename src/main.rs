use std::{process, sync::Arc};

use murmur::{
    application::{
        error::AppError, follow::FollowService, publish::PublishService, repos::TimelineStore,
        timeline::TimelineService,
    },
    cache::{
        CacheConfig, CacheStoreKind, CachedTimelineStore, FeedCache, MemoryFeedCache,
        RedisFeedCache,
    },
    config::{self, StorageBackend},
    infra::{db::PostgresRepositories, error::InfraError, memory::InMemoryTimelineStore, telemetry},
};
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Migrate => run_migrate(&settings).await,
        command => {
            let services = build_services(&settings).await?;
            run_command(&services, command).await
        }
    }
}

struct Services {
    publish: PublishService,
    follow: FollowService,
    timeline: TimelineService,
}

async fn run_command(services: &Services, command: config::Command) -> Result<(), AppError> {
    match command {
        config::Command::Publish(args) => {
            let post = services
                .publish
                .publish_post(&args.author, &args.text)
                .await?;
            print_json(&post)
        }
        config::Command::Follow(args) => {
            services
                .follow
                .follow_user(&args.follower, &args.followee)
                .await?;
            print_json(&FollowOutput {
                follower_id: &args.follower,
                followee_id: &args.followee,
            })
        }
        config::Command::Feed(args) => {
            let posts = match args.limit {
                Some(limit) => services.timeline.get_feed_page(&args.user, limit).await?,
                None => services.timeline.get_feed(&args.user).await?,
            };
            print_json(&posts)
        }
        config::Command::Followers(args) => {
            let mut followers = services.follow.followers(&args.user).await?;
            followers.sort();
            print_json(&followers)
        }
        config::Command::Migrate => Err(AppError::unexpected("migrate is handled separately")),
    }
}

#[derive(Serialize)]
struct FollowOutput<'a> {
    follower_id: &'a str,
    followee_id: &'a str,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{rendered}");
    Ok(())
}

async fn run_migrate(settings: &config::Settings) -> Result<(), AppError> {
    let repositories = connect_postgres(settings).await?;
    info!("Database migrations applied");
    repositories
        .health_check()
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

async fn build_services(settings: &config::Settings) -> Result<Services, AppError> {
    if !settings.storage.backend.is_durable() {
        warn!(
            "Using in-memory storage; follows and posts are discarded when this command exits. \
             Set storage.backend = \"postgres\" to keep them between invocations"
        );
    }
    let storage: Arc<dyn TimelineStore> = match settings.storage.backend {
        StorageBackend::Memory => Arc::new(InMemoryTimelineStore::new()),
        StorageBackend::Postgres => Arc::new(connect_postgres(settings).await?),
    };

    let store = wrap_with_cache(storage, CacheConfig::from(&settings.cache)).await?;

    let mut publish = PublishService::new(store.clone());
    let mut follow = FollowService::new(store.clone());
    let mut timeline = TimelineService::new(store);
    if let Some(timeout) = settings.timeline.operation_timeout {
        publish = publish.with_timeout(timeout);
        follow = follow.with_timeout(timeout);
        timeline = timeline.with_timeout(timeout);
    }

    Ok(Services {
        publish,
        follow,
        timeline,
    })
}

async fn connect_postgres(settings: &config::Settings) -> Result<PostgresRepositories, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(PostgresRepositories::new(pool))
}

async fn wrap_with_cache(
    storage: Arc<dyn TimelineStore>,
    config: CacheConfig,
) -> Result<Arc<dyn TimelineStore>, AppError> {
    if !config.enabled {
        return Ok(storage);
    }

    let cache: Arc<dyn FeedCache> = match config.store {
        CacheStoreKind::Memory => Arc::new(MemoryFeedCache::new(&config)),
        CacheStoreKind::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| InfraError::configuration("cache.redis_url is not configured"))?;
            let redis = RedisFeedCache::connect(url, config.ttl, config.op_timeout)
                .await
                .map_err(|err| AppError::from(InfraError::cache(err.to_string())))?;
            if let Err(err) = redis.ping().await {
                warn!(error = %err, "Redis is not answering; feed reads will fall through");
            }
            Arc::new(redis)
        }
    };

    Ok(Arc::new(CachedTimelineStore::new(storage, cache, &config)))
}
