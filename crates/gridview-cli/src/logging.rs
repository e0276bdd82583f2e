//! Logging setup for the `gridview` binary
//!
//! Console output goes to stderr so it never mixes with the rendered table or
//! JSON on stdout. A JSON file layer can be enabled for bug reports.

use std::path::PathBuf;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory where log files should be written
    pub log_dir: PathBuf,

    /// Whether to write JSON logs to a daily file
    pub enable_json_logs: bool,

    /// Whether to log to stderr
    pub enable_console_logs: bool,

    /// Whether to include file/line information in logs
    pub include_location: bool,

    /// Whether to log span open/close (remote fetches, drain loops)
    pub enable_spans: bool,

    /// Default log level filter
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: log_directory(),
            enable_json_logs: false,
            enable_console_logs: true,
            include_location: false,
            enable_spans: false,
            default_filter: "warn,gridview_cli=info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Quiet console, JSON logs kept for bug reports
    pub fn production() -> Self {
        Self {
            enable_json_logs: true,
            default_filter: "warn".to_string(),
            ..Self::default()
        }
    }

    /// Verbose console output with locations and spans
    pub fn development() -> Self {
        Self {
            include_location: true,
            enable_spans: true,
            default_filter: "debug,gridview_core=debug,gridview_engine=debug,gridview_cli=debug"
                .to_string(),
            ..Self::default()
        }
    }

    /// Pick a preset from the number of `-v` flags
    pub fn for_verbosity(verbose: u8) -> Self {
        match verbose {
            0 => Self::default(),
            1 => Self {
                default_filter: "info,gridview_engine=debug".to_string(),
                ..Self::default()
            },
            _ => Self::development(),
        }
    }

    pub fn with_json_logs(mut self, enabled: bool) -> Self {
        self.enable_json_logs = enabled;
        self
    }
}

/// Initialize the logging system with the given configuration
pub fn init(config: LoggingConfig) -> anyhow::Result<()> {
    // RUST_LOG takes precedence over the configured default
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers = Vec::new();

    if config.enable_console_logs {
        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events.clone())
            .with_ansi(true)
            .compact()
            .with_filter(env_filter.clone())
            .boxed();

        layers.push(console_layer);
    }

    if config.enable_json_logs {
        std::fs::create_dir_all(&config.log_dir)?;
        let file_appender = tracing_appender::rolling::daily(&config.log_dir, "gridview.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // The guard flushes on drop and must outlive every log call
        std::mem::forget(guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(span_events)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(non_blocking)
            .with_filter(env_filter)
            .boxed();

        layers.push(json_layer);
    }

    tracing_subscriber::registry().with(layers).init();

    tracing::debug!(
        log_dir = %config.log_dir.display(),
        json_enabled = config.enable_json_logs,
        console_enabled = config.enable_console_logs,
        "Logging system initialized"
    );

    Ok(())
}

/// Get the log directory path
pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gridview")
        .join("logs")
}
