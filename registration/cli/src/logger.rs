use std::fs::File;
use std::io;

use tracing::subscriber::set_global_default;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::fmt::layer;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, registry};

/// Overrides where the bunyan log file is written
pub const LOG_FILE_ENV: &str = "ONBOARDING_LOG_FILE";
const DEFAULT_LOG_FILE: &str = "onboarding-cli.log";

/// Human-readable logs go to stderr, filtered by `RUST_LOG`; stdout carries command output only.
pub fn setup_logger() {
    LogTracer::init().expect("Failed to set logger");

    let stderr_layer = layer()
        .pretty()
        .with_writer(io::stderr)
        .with_filter(EnvFilter::from_default_env());

    let path = std::env::var(LOG_FILE_ENV).unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
    let file = File::create(&path).expect("Failed to create log file");
    let formatting_layer = BunyanFormattingLayer::new("onboarding-cli".into(), file);

    set_global_default(
        registry()
            .with(stderr_layer)
            .with(formatting_layer)
            .with(JsonStorageLayer),
    )
    .expect("Failed to set global default");
}
