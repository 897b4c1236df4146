use std::{
    fs::{self, File},
    io::Write,
    path::Path,
    sync::Mutex,
};

use chrono::Utc;
use log::{LevelFilter, Log, Metadata, Record};

use super::LogEntry;

/// Writes every record as one JSON object per line. The file is truncated
/// when the logger is created.
pub struct FileLog {
    target: Option<Mutex<File>>,
    max_level: LevelFilter,
}

impl FileLog {
    pub fn new(target: impl AsRef<Path>) -> Self {
        let target = target.as_ref();
        let file = target
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| File::create(target));

        let target = match file {
            Ok(file) => Some(Mutex::new(file)),
            Err(err) => {
                eprintln!(
                    "Logging setup error: failed to create log file '{}': {err:?}",
                    target.display()
                );
                None
            }
        };

        Self {
            target,
            max_level: LevelFilter::Trace,
        }
    }

    pub fn with_max_level(self, max_level: LevelFilter) -> Self {
        Self { max_level, ..self }
    }

    pub fn into_logger(self) -> Box<dyn Log> {
        Box::new(self)
    }

    /// Best effort attempt to write the log entry to the file
    fn write_entry(&self, record: &Record) -> Result<(), Box<dyn std::error::Error + '_>> {
        if let Some(file) = self.target.as_ref() {
            let mut serialized = serde_json::to_string(&LogEntry::new(record, Utc::now()))?;
            serialized.push('\n');

            let mut file = file.lock()?;
            file.write_all(serialized.as_bytes())?;
        }

        Ok(())
    }
}

impl Log for FileLog {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.target.is_some() && metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        let _ = self.write_entry(record);
    }

    fn flush(&self) {
        if let Some(Ok(mut file)) = self.target.as_ref().map(Mutex::lock) {
            let _ = file.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use log::Level;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_filter() {
        let test_dir = tempdir().unwrap();
        let logger = FileLog::new(test_dir.path().join("nvmcfg.log"))
            .with_max_level(LevelFilter::Info)
            .into_logger();

        assert!(logger.enabled(&Metadata::builder().level(Level::Info).build()));
        assert!(!logger.enabled(&Metadata::builder().level(Level::Debug).build()));
    }

    #[test]
    fn test_disabled() {
        let test_dir = tempdir().unwrap();
        // A directory cannot be opened as a log file
        let log = FileLog::new(test_dir.path());
        assert!(log.target.is_none());
        assert!(!log
            .into_logger()
            .enabled(&Metadata::builder().level(Level::Error).build()));
    }

    #[test]
    fn test_file_log() {
        let test_dir = tempdir().unwrap();
        let target = test_dir.path().join("logs").join("nvmcfg.log");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, "stale content\n").unwrap();

        let logger = FileLog::new(&target).into_logger();
        for message in ["first", "second"] {
            logger.log(
                &Record::builder()
                    .args(format_args!("{message}"))
                    .level(Level::Warn)
                    .target("nvmcfg")
                    .line(Some(42))
                    .build(),
            );
        }
        logger.flush();

        let content = fs::read_to_string(&target).unwrap();
        assert!(!content.contains("stale content"));
        let entries = content
            .lines()
            .map(|line| serde_json::from_str::<LogEntry>(line).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[1].message, "second");
        assert_eq!(entries[1].level, Level::Warn.into());
        assert_eq!(entries[1].line, 42);
    }

    #[test]
    fn test_creates_directory() {
        let test_dir = tempdir().unwrap();
        let target = test_dir.path().join("a").join("b").join("nvmcfg.log");
        let log = FileLog::new(&target);
        assert!(log.target.is_some());
        assert!(target.exists());
    }
}
