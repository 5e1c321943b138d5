use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::{
    METRIC_FEED_CACHE_ERROR, METRIC_FEED_CACHE_HIT, METRIC_FEED_CACHE_INVALIDATE,
    METRIC_FEED_CACHE_MISS, METRIC_FEED_CACHE_POPULATE_FAILED,
};
use crate::config::{LogFormat, LoggingSettings};
use crate::infra::db::{METRIC_FANOUT_FAILED, METRIC_FANOUT_TARGETS};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    // stdout carries command output.
    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(std::io::stderr)
            .compact()
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_FEED_CACHE_HIT,
            Unit::Count,
            "Total number of feed reads served from the cache."
        );
        describe_counter!(
            METRIC_FEED_CACHE_MISS,
            Unit::Count,
            "Total number of feed reads that fell through to storage."
        );
        describe_counter!(
            METRIC_FEED_CACHE_POPULATE_FAILED,
            Unit::Count,
            "Total number of failed feed cache writes after a miss."
        );
        describe_counter!(
            METRIC_FEED_CACHE_INVALIDATE,
            Unit::Count,
            "Total number of feed cache entries invalidated by writes."
        );
        describe_counter!(
            METRIC_FEED_CACHE_ERROR,
            Unit::Count,
            "Total number of failed or timed-out feed cache calls, labelled by operation."
        );
        describe_counter!(
            METRIC_FANOUT_FAILED,
            Unit::Count,
            "Total number of publishes whose follower fan-out was rolled back."
        );
        describe_histogram!(
            METRIC_FANOUT_TARGETS,
            Unit::Count,
            "Number of feeds a published post was written to."
        );
    });
}
