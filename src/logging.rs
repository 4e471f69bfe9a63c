//! # Structured Logging Module
//!
//! Environment-aware structured logging for sources, processors and the host.
//! Plain console output by default, JSON lines when `logging.json` is set.

use chrono::Utc;
use std::path::Path;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LoggingConfig, PipelineConfig};
use crate::error::PipelineError;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = config
            .level
            .clone()
            .unwrap_or_else(|| get_log_level(&environment).to_string());

        // RUST_LOG wins over configured and environment defaults
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let console = if config.json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // Use try_init to avoid panic if global subscriber already set
        if tracing_subscriber::registry().with(console).try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            level = %log_level,
            json = config.json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("PIPELINE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "test" => "debug",
        "development" => "debug",
        "production" => "info",
        _ => "debug",
    }
}

/// Log a configuration load with the values operators usually ask about
pub fn log_config_loaded(environment: &str, directory: &Path, config: &PipelineConfig) {
    tracing::info!(
        environment = %environment,
        directory = %directory.display(),
        polling_interval_ms = config.polling.interval_ms,
        push_buffer_size = config.push.buffer_size,
        duplicate_names = ?config.host.duplicate_names,
        shutdown_timeout_ms = config.host.shutdown_timeout_ms,
        "⚙️ CONFIG_LOADED"
    );
}

/// Log structured data for message source operations
pub fn log_source_operation(operation: &str, source: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        source = %source,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📥 SOURCE_OPERATION"
    );
}

/// Log structured data for message processor operations
pub fn log_processor_operation(
    operation: &str,
    processor: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        processor = %processor,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "⚙️ PROCESSOR_OPERATION"
    );
}

/// Log structured data for host routing operations
pub fn log_routing_operation(route: &str, recipient: Option<&str>, matched: usize, status: &str) {
    tracing::debug!(
        route = %route,
        recipient = recipient,
        matched = matched,
        status = %status,
        timestamp = %Utc::now().to_rfc3339(),
        "🔀 ROUTING_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &PipelineError, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        category = error.category(),
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
