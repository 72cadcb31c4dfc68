/*!
 * Logging and tracing initialization
 */

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::SupervisionConfig;
use crate::error::{Result, SupervisorError};

/// Level the supervisor logs at for this configuration
pub fn effective_level(config: &SupervisionConfig) -> Level {
    if config.debug {
        Level::DEBUG
    } else {
        config.log_level.to_tracing_level()
    }
}

/// Initialize structured logging based on configuration
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &SupervisionConfig) -> Result<()> {
    let level = effective_level(config);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            EnvFilter::try_new(format!(
                "skywarden={level},skywarden_core_ephemeris={level},skywarden_core_guard={level}"
            ))
        })
        .map_err(|e| SupervisorError::ConfigInvalid(format!("Failed to create log filter: {}", e)))?;

    if let Some(ref log_path) = config.log_file {
        let file = RotatingFile::open(log_path, config.log_max_bytes, config.log_backups).map_err(|e| {
            SupervisorError::ConfigInvalid(format!("Failed to open log file {}: {}", log_path.display(), e))
        })?;
        init_file_logging(file, env_filter);
    } else {
        init_stdout_logging(env_filter);
    }

    Ok(())
}

fn init_stdout_logging(env_filter: EnvFilter) {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// JSON lines, appended so restarts keep the history
fn init_file_logging(file: RotatingFile, env_filter: EnvFilter) {
    let fmt_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Size-capped log file with numbered backups
///
/// Once the live file would grow past `max_bytes` it becomes `<path>.1`,
/// older backups shift up by one and anything past `<path>.<backups>` is
/// removed. A single record larger than the cap still lands whole in a
/// fresh file.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
    file: File,
    written: u64,
}

impl RotatingFile {
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let path = path.into();
        let file = append(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path,
            max_bytes,
            backups,
            file,
            written,
        })
    }

    /// `<path>.<n>`
    pub fn backup_path(&self, n: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.backups == 0 {
            self.file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?;
        } else {
            remove_if_present(&self.backup_path(self.backups))?;
            for n in (1..self.backups).rev() {
                let from = self.backup_path(n);
                if from.exists() {
                    fs::rename(&from, self.backup_path(n + 1))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1))?;
            self.file = append(&self.path)?;
        }

        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Initialize logging for tests; safe to call repeatedly
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("skywarden=debug"));

        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .ok();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{tests::minimal, LogLevel};

    #[test]
    fn test_debug_overrides_log_level() {
        let mut config = minimal();
        config.log_level = LogLevel::Warn;
        assert_eq!(effective_level(&config), Level::WARN);

        config.debug = true;
        assert_eq!(effective_level(&config), Level::DEBUG);
    }

    fn record(n: usize) -> Vec<u8> {
        format!("{{\"seq\":{:04},\"msg\":\"relay settled\"}}\n", n).into_bytes()
    }

    #[test]
    fn test_rotating_file_honours_size_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skywarden.json");
        let line = record(0).len() as u64;
        let cap = line * 4;

        let mut file = RotatingFile::open(&path, cap, 3).unwrap();
        for n in 0..40 {
            file.write_all(&record(n)).unwrap();
        }
        file.flush().unwrap();

        assert!(fs::metadata(&path).unwrap().len() <= cap);
        for n in 1..=3 {
            let backup = file.backup_path(n);
            assert_eq!(fs::metadata(&backup).unwrap().len(), cap, "{}", backup.display());
        }
        assert!(!file.backup_path(4).exists());

        let live = fs::read_to_string(&path).unwrap();
        assert!(live.ends_with(&String::from_utf8(record(39)).unwrap()));
        let newest_backup = fs::read_to_string(file.backup_path(1)).unwrap();
        assert!(newest_backup.starts_with(&String::from_utf8(record(32)).unwrap()));
    }

    #[test]
    fn test_rotating_file_counts_existing_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skywarden.json");
        let line = record(0).len() as u64;
        fs::write(&path, [record(0), record(1)].concat()).unwrap();

        let mut file = RotatingFile::open(&path, line * 2, 1).unwrap();
        file.write_all(&record(2)).unwrap();

        assert_eq!(fs::read(&path).unwrap(), record(2));
        assert_eq!(fs::read(file.backup_path(1)).unwrap(), [record(0), record(1)].concat());
    }

    #[test]
    fn test_rotating_file_without_backups_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skywarden.json");
        let line = record(0).len() as u64;

        let mut file = RotatingFile::open(&path, line, 0).unwrap();
        for n in 0..5 {
            file.write_all(&record(n)).unwrap();
        }

        assert_eq!(fs::read(&path).unwrap(), record(4));
        assert!(!file.backup_path(1).exists());
    }

    #[test]
    fn test_init_test_logging_is_idempotent() {
        init_test_logging();
        init_test_logging();
        tracing::info!("logging initialized twice without panicking");
    }
}
