//! Logging and tracing initialization.
//!
//! Every event is appended to the log file as `<timestamp> <message>`; the
//! console copy is optional (`print_to_screen`), keeps spans and structured
//! fields, and can be JSON for machine parsing.

use std::fmt::{self as stdfmt, Write as _};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    EnvFilter,
    fmt::{
        self, FmtContext, FormatEvent, FormatFields,
        format::{DefaultFields, Writer},
        time::FormatTime,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// Timestamp format of the log file.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Configuration for the logging system.
#[derive(Default)]
pub struct LogConfig {
    /// Append-only log file; `None` logs to the console only.
    pub log_file: Option<PathBuf>,
    /// Mirror log lines to stdout
    pub print_to_screen: bool,
    /// Output console logs as JSON (for machine parsing)
    pub json: bool,
    /// Enable verbose logging (sets default level to DEBUG)
    pub verbose: bool,
}

/// Local wall-clock timestamps, e.g. `2024-06-01 14:03:22`.
pub struct LocalTimestamp;

impl FormatTime for LocalTimestamp {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format(TIMESTAMP_FORMAT))
    }
}

/// Collects the `message` field of an event; every other field is ignored.
#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0.push_str(value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn stdfmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.0, "{value:?}");
        }
    }
}

/// The formatted message of an event, without its fields or spans.
pub fn event_message(event: &Event<'_>) -> String {
    let mut visitor = MessageVisitor::default();
    event.record(&mut visitor);
    visitor.0
}

/// Log file line format: `<timestamp> <message>`, nothing else.
pub struct MessageLine;

impl<S, N> FormatEvent<S, N> for MessageLine
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        LocalTimestamp.format_time(&mut writer)?;
        writeln!(writer, " {}", event_message(event))
    }
}

/// Append-only file layer writing [`MessageLine`]s to `path`.
pub fn file_layer<S>(path: &Path) -> Result<fmt::Layer<S, DefaultFields, MessageLine, Mutex<File>>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    Ok(fmt::layer()
        .with_ansi(false)
        .event_format(MessageLine)
        .with_writer(Mutex::new(open_log_file(path)?)))
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Initialize the tracing subscriber with the given configuration.
///
/// Call once, early in main(), after config is loaded. The log level can be
/// overridden at runtime via the `RUST_LOG` environment variable.
pub fn init(config: LogConfig) -> Result<()> {
    let default_level = if config.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("sdbackup={}", default_level.as_str().to_lowercase()))
    });

    let file_layer = match &config.log_file {
        Some(path) => Some(file_layer(path)?),
        None => None,
    };

    let console = config.print_to_screen || config.log_file.is_none();

    let json_layer = (console && config.json).then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
    });

    let pretty_layer = (console && !config.json).then(|| {
        fmt::layer()
            .with_timer(LocalTimestamp)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}
