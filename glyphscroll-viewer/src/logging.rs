use std::path::PathBuf;

use color_eyre::Report;
use directories::ProjectDirs;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{Layer, filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Configuration for the logging system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level for file output
    pub file_level: Level,
    /// Log level for console output
    pub console_level: Level,
    /// Directory where log files should be written
    pub log_dir: Option<PathBuf>,
    /// Whether to enable JSON formatted logs for structured output
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_level: Level::DEBUG,
            console_level: Level::WARN,
            log_dir: Some(Self::default_log_dir()),
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Get the OS-appropriate default log directory
    pub fn default_log_dir() -> PathBuf {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "glyphscroll") {
            // On Linux: ~/.cache/glyphscroll
            // On macOS: ~/Library/Caches/glyphscroll
            // On Windows: %LOCALAPPDATA%\glyphscroll\cache
            proj_dirs.cache_dir().to_path_buf()
        } else {
            PathBuf::from("glyphscroll-logs")
        }
    }

    /// Create logging configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let level = |key: &str| lookup(key).and_then(|value| value.parse::<Level>().ok());

        if let Some(parsed_level) = level("GLYPHSCROLL_LOG_LEVEL") {
            config.file_level = parsed_level;
            config.console_level = parsed_level;
        }

        if let Some(parsed_level) = level("GLYPHSCROLL_FILE_LOG_LEVEL") {
            config.file_level = parsed_level;
        }

        if let Some(parsed_level) = level("GLYPHSCROLL_CONSOLE_LOG_LEVEL") {
            config.console_level = parsed_level;
        }

        if let Some(log_dir) = lookup("GLYPHSCROLL_LOG_DIR") {
            config.log_dir = Some(PathBuf::from(log_dir));
        }

        if lookup("GLYPHSCROLL_NO_FILE_LOGS").is_some() {
            config.log_dir = None;
        }

        if lookup("GLYPHSCROLL_JSON_LOGS").is_some() {
            config.json_format = true;
        }

        config
    }
}

fn env_filter(level: Level) -> Result<EnvFilter, Report> {
    // font discovery is chatty about every face it skips
    Ok(EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
        .add_directive("fontdb=warn".parse()?))
}

/// Initialize the logging system with the given configuration
pub fn init_logging(config: LoggingConfig) -> Result<Option<WorkerGuard>, Report> {
    let mut layers = vec![];
    let mut guard = None;

    if let Some(log_dir) = &config.log_dir {
        std::fs::create_dir_all(log_dir)?;

        let file_appender = tracing_appender::rolling::daily(log_dir, "glyphscroll.log");
        let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(file_guard);

        let file_filter = env_filter(config.file_level)?;
        let file_layer = if config.json_format {
            fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(file_filter)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(file_filter)
                .boxed()
        };

        layers.push(file_layer);
    }

    let console_layer = fmt::layer()
        .with_target(false)
        .with_filter(env_filter(config.console_level)?)
        .boxed();
    layers.push(console_layer);

    tracing_subscriber::registry().with(layers).init();

    Ok(guard)
}
