//! Tracing subscriber setup for binaries embedding Tessera.

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global tracing subscriber.
///
/// - **Console**: compact format, filtered by `RUST_LOG`, falling back to
///   `LOG_LEVEL` (default `info`) for the Tessera crates
/// - **JSON file**: daily-rolling `tessera.json` under `LOG_DIR`, only when
///   `LOG_DIR` is set
///
/// Calling this twice is harmless; the second subscriber is ignored.
pub fn init_tracing() {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "tessera={log_level},tessera_store={log_level},tessera_cli={log_level},redis=warn"
        ))
    });

    let console_layer = fmt::layer()
        .compact()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(true)
        .with_line_number(true)
        .with_filter(console_filter);

    // JSON file layer for structured logs
    let json_layer = std::env::var("LOG_DIR").ok().map(|log_dir| {
        let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "tessera.json");
        fmt::layer()
            .json()
            .with_writer(appender)
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(EnvFilter::new("info"))
    });

    let _ = tracing_subscriber::registry()
        .with(console_layer)
        .with(json_layer)
        .try_init();
}
