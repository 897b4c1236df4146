//! Log sinks installed by the nvmcfg binary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub(super) mod file_log;
pub(super) mod multilog;

/// One line of a JSON log file.
#[derive(Debug, Serialize, Deserialize)]
struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub target: String,
    pub module: String,
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Level {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl From<log::Level> for Level {
    fn from(value: log::Level) -> Self {
        match value {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warn,
            log::Level::Info => Level::Info,
            log::Level::Debug => Level::Debug,
            log::Level::Trace => Level::Trace,
        }
    }
}

impl LogEntry {
    fn new(record: &log::Record, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            level: record.level().into(),
            message: record.args().to_string(),
            target: record.target().to_string(),
            module: record.module_path().unwrap_or_default().to_string(),
            file: record.file().unwrap_or_default().to_string(),
            line: record.line().unwrap_or_default(),
        }
    }
}
