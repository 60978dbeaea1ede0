use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::admin::photos::METRIC_DERIVATIVE_FAILED;
use crate::cache::{
    METRIC_IMAGE_HIT, METRIC_IMAGE_INVALIDATE, METRIC_IMAGE_MISS, METRIC_PROFILE_HIT,
    METRIC_PROFILE_INVALIDATE, METRIC_PROFILE_MISS,
};
use crate::config::{LogFormat, LoggingSettings};
use crate::live::METRIC_PUBLISH_FAILED;

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global tracing subscriber and describe the process metrics.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| InfraError::Telemetry(err.to_string()))
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_PROFILE_HIT,
            Unit::Count,
            "Profile reads served from memory."
        );
        describe_counter!(
            METRIC_PROFILE_MISS,
            Unit::Count,
            "Profile reads that went to the database."
        );
        describe_counter!(
            METRIC_PROFILE_INVALIDATE,
            Unit::Count,
            "Explicit profile cache invalidations."
        );
        describe_counter!(
            METRIC_IMAGE_HIT,
            Unit::Count,
            "Image byte reads served from memory."
        );
        describe_counter!(
            METRIC_IMAGE_MISS,
            Unit::Count,
            "Image byte reads that went to object storage."
        );
        describe_counter!(
            METRIC_IMAGE_INVALIDATE,
            Unit::Count,
            "Explicit image cache invalidations."
        );
        describe_counter!(
            METRIC_PUBLISH_FAILED,
            Unit::Count,
            "Profile updates a live channel failed to deliver, labelled by channel."
        );
        describe_counter!(
            METRIC_DERIVATIVE_FAILED,
            Unit::Count,
            "Photo derivatives that could not be rendered or stored."
        );
    });
}
