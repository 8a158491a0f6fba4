//! # Structured Logging Module
//!
//! Environment-aware structured logging that outputs to both console and
//! files for debugging complex async invocation flows.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Console output is human-readable; file output under `log/` is JSON for
/// ingestion. Idempotent, and tolerant of an already-installed global
/// subscriber (e.g. from a host application).
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let log_dir = PathBuf::from("log");
        if !log_dir.exists() {
            if let Err(err) = fs::create_dir_all(&log_dir) {
                eprintln!("failed to create log directory: {err}");
                return;
            }
        }

        let pid = process::id();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let log_filename = format!("{environment}.{pid}.{timestamp}.log");

        let file_appender = tracing_appender::rolling::never(&log_dir, &log_filename);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true)
                    .with_filter(EnvFilter::new(log_level.clone())),
            )
            .with(
                fmt::layer()
                    .with_writer(file_writer)
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(EnvFilter::new(log_level)),
            );

        // A host application may already have installed a subscriber.
        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            log_file = %log_dir.join(&log_filename).display(),
            "🔧 STRUCTURED LOGGING: Initialized with file output"
        );

        // The writer guard must live for the process lifetime.
        std::mem::forget(guard);
    });
}

/// Log structured data for invocation pipeline operations.
pub fn log_invocation(
    operation: &str,
    endpoint: Option<&str>,
    status: &str,
    duration_ms: Option<u64>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        endpoint = endpoint,
        status = %status,
        duration_ms = duration_ms,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📡 INVOCATION"
    );
}

/// Log structured data for batch execution operations.
pub fn log_batch_execution(
    execution_id: &str,
    strategy: &str,
    total_tasks: usize,
    successful_tasks: usize,
    status: &str,
) {
    tracing::info!(
        execution_id = %execution_id,
        strategy = %strategy,
        total_tasks = total_tasks,
        successful_tasks = successful_tasks,
        status = %status,
        timestamp = %Utc::now().to_rfc3339(),
        "⚡ BATCH_EXECUTION"
    );
}

/// Log an error with full context.
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}

/// Get current environment from environment variables.
fn get_environment() -> String {
    std::env::var("INVOKER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment.
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}
