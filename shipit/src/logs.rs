//! Logging configuration and the per-run log file

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::DeployError;

/// Number of run logs kept after pruning
pub const DEFAULT_LOG_RETENTION: usize = 5;

const LOG_PREFIX: &str = "deploy_";
const LOG_SUFFIX: &str = ".log";

/// Log level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_filter_string(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl serde::Serialize for LogLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_filter_string())
    }
}

impl<'de> serde::Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Console logging options
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Log level
    pub log_level: LogLevel,

    /// Enable JSON format
    pub json_format: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_format: false,
        }
    }
}

/// Initialize console logging
pub fn init_logging(options: LogOptions) -> Result<(), DeployError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.log_level.to_filter_string()));

    let subscriber = tracing_subscriber::registry().with(filter);

    if options.json_format {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| DeployError::ConfigError(e.to_string()))?;
    } else {
        subscriber
            .with(fmt::layer().with_target(false))
            .try_init()
            .map_err(|e| DeployError::ConfigError(e.to_string()))?;
    }

    Ok(())
}

/// File name of the run log started at `started_at`
pub fn log_file_name(started_at: DateTime<Local>) -> String {
    format!(
        "{}{}{}",
        LOG_PREFIX,
        started_at.format("%Y%m%d_%H%M%S_%3f"),
        LOG_SUFFIX
    )
}

fn is_run_log(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(LOG_PREFIX) && n.ends_with(LOG_SUFFIX))
        .unwrap_or(false)
}

/// Delete all but the `keep` most recent run logs in `dir`
///
/// Run log names embed their start time, so name order is creation order.
/// Returns the removed paths.
pub fn prune_logs(dir: &Path, keep: usize) -> Result<Vec<PathBuf>, DeployError> {
    let mut logs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_run_log(path))
        .collect();
    logs.sort();

    let excess = logs.len().saturating_sub(keep);
    let removed: Vec<PathBuf> = logs.into_iter().take(excess).collect();
    for path in &removed {
        std::fs::remove_file(path)?;
    }
    Ok(removed)
}

/// Append-only log of a single deployment run
///
/// Every line is timestamped, written to the run's log file and mirrored to
/// the console through `tracing`.
pub struct RunLog {
    path: PathBuf,
    writer: Mutex<NonBlocking>,
    guard: WorkerGuard,
}

impl RunLog {
    /// Create the log file for a run starting now
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, DeployError> {
        Self::create_at(dir, Local::now())
    }

    /// Create the log file for a run started at `started_at`
    pub fn create_at(dir: impl AsRef<Path>, started_at: DateTime<Local>) -> Result<Self, DeployError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let name = log_file_name(started_at);
        let path = dir.join(&name);
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(name.as_str())
            .build(dir)?;
        let (writer, guard) = tracing_appender::non_blocking(appender);

        Ok(Self {
            path,
            writer: Mutex::new(writer),
            guard,
        })
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, level: &str, message: &str) {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut buf = String::new();
        for line in message.lines() {
            buf.push_str(&format!("[{}] {:<5} {}\n", stamp, level, line));
        }
        if let Ok(mut writer) = self.writer.lock() {
            // A failed log write must never abort a deployment
            let _ = writer.write_all(buf.as_bytes());
        }
    }

    pub fn info(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!("{}", message);
        self.append("INFO", message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        warn!("{}", message);
        self.append("WARN", message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        error!("{}", message);
        self.append("ERROR", message);
    }

    /// Record subprocess output in the file only
    pub fn output(&self, stream: &str, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let indented: String = text
            .lines()
            .map(|line| format!("  {}> {}\n", stream, line))
            .collect();
        self.append("OUT", indented.trim_end_matches('\n'));
    }

    /// Flush the log and prune old run logs, keeping the newest `keep`
    pub fn finish(self, keep: usize) -> Result<Vec<PathBuf>, DeployError> {
        let RunLog { path, writer, guard } = self;
        drop(writer);
        drop(guard);

        // The run's own log is always kept
        match path.parent() {
            Some(dir) => prune_logs(dir, keep.max(1)),
            None => Ok(Vec::new()),
        }
    }
}
