use std::env::var;
use std::str::FromStr;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the subscriber at INFO.
pub fn init_tracing() {
    initialize_tracing(LevelFilter::INFO, None);
}

/// Install the subscriber at `level`, using `format` ("json" or "compact")
/// unless `RUST_LOG_FORMAT` says otherwise. `RUST_LOG` still overrides the
/// level.
pub fn init_with(level: &str, format: Option<&str>) {
    initialize_tracing(parse_level(level), format);
}

/// Parse a level name, falling back to INFO.
pub fn parse_level(level: &str) -> LevelFilter {
    LevelFilter::from_str(level.trim()).unwrap_or(LevelFilter::INFO)
}

fn initialize_tracing(level: LevelFilter, default_format: Option<&str>) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_format = var("RUST_LOG_FORMAT")
        .ok()
        .or_else(|| default_format.map(str::to_string))
        .unwrap_or_default();

    let log_layer = match log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_filter(env_filter)
            .boxed(),
    };

    if let Err(error) = tracing_subscriber::registry().with(log_layer).try_init() {
        warn!("Tracing already initialized: {error}");
    }
}
