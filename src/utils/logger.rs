use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Logger configuration.
///
/// # Examples
///
/// ```no_run
/// use quiesce::utils::logger::LoggerConfig;
///
/// LoggerConfig::new()
///     .with_level("debug")
///     .init()
///     .ok();
/// ```
#[derive(Debug)]
pub struct LoggerConfig {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to enable console output
    pub enable_console: bool,
    /// Whether to use JSON format for logs
    pub json_format: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_console: true,
            json_format: false,
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the logger with this configuration
    pub fn init(self) -> Result<(), Box<dyn std::error::Error>> {
        init_logger(self)
    }

    /// Set the log level
    pub fn with_level(mut self, level: impl AsRef<str>) -> Self {
        self.level = level.as_ref().into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enable: bool) -> Self {
        self.enable_console = enable;
        self
    }

    /// Enable or disable JSON format
    pub fn with_json(mut self, enable: bool) -> Self {
        self.json_format = enable;
        self
    }
}

pub fn is_logging_disabled() -> bool {
    let value = env::var("DISABLE_LOGS")
        .or_else(|_| env::var("QUIESCE_DISABLE_LOGS"))
        .unwrap_or_default();
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

/// Initialize and configure the tracing logger. Idempotent: later calls are
/// no-ops once a subscriber is installed.
pub fn init_logger(config: LoggerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if is_logging_disabled() {
        // Mark initialized to avoid repeated attempts when logging is disabled.
        let _ = LOGGER_INITIALIZED.swap(true, Ordering::SeqCst);
        return Ok(());
    }
    if LOGGER_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::warn!("Logger already initialized, skipping re-initialization");
        return Ok(());
    }

    // bridge log crate
    let _ = LogTracer::builder()
        .with_max_level(log::LevelFilter::Trace)
        .init();

    let default_level = config.level.to_lowercase();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if config.enable_console {
        if config.json_format {
            let _ = registry.with(fmt::layer().json()).try_init();
        } else {
            let _ = registry
                .with(fmt::layer().compact().with_target(false))
                .try_init();
        }
    } else {
        let _ = registry.try_init();
    }
    Ok(())
}
