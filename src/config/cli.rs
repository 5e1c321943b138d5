use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the murmur binary.
#[derive(Debug, Parser)]
#[command(name = "murmur", version, about = "Timeline fan-out operator tool")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MURMUR_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Validate and publish a post, fanning it out to followers.
    Publish(PublishArgs),
    /// Make one user follow another, backfilling recent posts.
    Follow(FollowArgs),
    /// Print a user's feed, newest first.
    Feed(FeedArgs),
    /// List the followers of a user.
    Followers(FollowersArgs),
    /// Apply pending database migrations.
    Migrate,
}

#[derive(Debug, Args, Clone)]
pub struct PublishArgs {
    /// Author of the post.
    #[arg(long, value_name = "USER")]
    pub author: String,

    /// Post body, at most 280 characters.
    #[arg(value_name = "TEXT")]
    pub text: String,
}

#[derive(Debug, Args, Clone)]
pub struct FollowArgs {
    #[arg(long, value_name = "USER")]
    pub follower: String,

    #[arg(long, value_name = "USER")]
    pub followee: String,
}

#[derive(Debug, Args, Clone)]
pub struct FeedArgs {
    /// Owner of the feed.
    #[arg(value_name = "USER")]
    pub user: String,

    /// Page size; defaults to the standard page of 50.
    #[arg(long, value_name = "COUNT")]
    pub limit: Option<usize>,
}

#[derive(Debug, Args, Clone)]
pub struct FollowersArgs {
    #[arg(value_name = "USER")]
    pub user: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL", global = true)]
    pub database_url: Option<String>,

    /// Override the storage backend (memory|postgres).
    #[arg(long = "storage-backend", value_name = "BACKEND", global = true)]
    pub storage_backend: Option<String>,

    /// Enable the feed cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_enabled: Option<bool>,

    /// Override the feed cache store (memory|redis).
    #[arg(long = "cache-store", value_name = "STORE", global = true)]
    pub cache_store: Option<String>,

    /// Override the Redis URL used by the redis cache store.
    #[arg(long = "cache-redis-url", value_name = "URL", global = true)]
    pub cache_redis_url: Option<String>,

    /// Override the per-call feed cache timeout in milliseconds.
    #[arg(long = "cache-op-timeout-ms", value_name = "MS", global = true)]
    pub cache_op_timeout_ms: Option<u64>,

    /// Override the per-call storage deadline in milliseconds.
    #[arg(long = "timeline-operation-timeout-ms", value_name = "MS", global = true)]
    pub operation_timeout_ms: Option<u64>,
}
