//! Process-wide logging setup and metric descriptions.

use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

/// Counters emitted by the group repository.
const GROUP_CACHE_COUNTERS: [(&str, &str); 3] = [
    (
        "pagebits_group_cache_hit_total",
        "Loaded-group reads served from the cache.",
    ),
    (
        "pagebits_group_cache_miss_total",
        "Loaded-group reads that went to the database.",
    ),
    (
        "pagebits_group_cache_invalidate_total",
        "Cache entries dropped after a content change or an operator request.",
    ),
];

static DESCRIBED: Once = Once::new();

/// Install the global subscriber. `RUST_LOG` refines the configured level.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let output = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default())
        .with(output)
        .try_init()
        .map_err(|err| InfraError::Telemetry(err.to_string()))
}

fn describe_metrics() {
    DESCRIBED.call_once(|| {
        for (name, description) in GROUP_CACHE_COUNTERS {
            describe_counter!(name, Unit::Count, description);
        }
    });
}
