use std::{
    fs,
    fs::File,
    io,
    io::prelude::Write as _,
    path::{Path, PathBuf},
    thread,
    time::SystemTime,
};

use log::{LevelFilter, Log};
use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerInitErr {
    #[error("could not create log file: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    SetLogger(#[from] log::SetLoggerError),
}

/// installs a [`Logger`] writing to a new file in `log_dir` as the global logger
pub fn init(
    log_dir: impl AsRef<Path>,
    name: impl AsRef<str>,
    max_level: LevelFilter,
) -> Result<PathBuf, LoggerInitErr> {
    let logger = Logger::new(log_dir, name, max_level)?;
    let path = logger.path().to_path_buf();
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(max_level);
    Ok(path)
}

/// appends every record to one file per run, named after the bot and the time it started
pub struct Logger {
    max_level: LevelFilter,
    path: PathBuf,
    log_file: Mutex<File>,
}

impl Logger {
    pub fn new(
        log_dir: impl AsRef<Path>,
        name: impl AsRef<str>,
        max_level: LevelFilter,
    ) -> io::Result<Self> {
        let folder = log_dir.as_ref();
        fs::create_dir_all(folder)?;
        let path = folder.join(format!(
            "{}-{}.txt",
            name.as_ref(),
            humantime::format_rfc3339_seconds(SystemTime::now())
        ));
        Ok(Self {
            log_file: Mutex::new(File::options().create(true).append(true).open(&path)?),
            path,
            max_level,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&self) -> MutexGuard<'_, File> {
        self.log_file.lock()
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let thread = thread::current();
        let _ = self.file().write_fmt(format_args!(
            "[{}] [{:<5}] [{}] {}\n",
            humantime::format_rfc3339_millis(SystemTime::now()),
            record.level(),
            thread.name().unwrap_or("unnamed"),
            record.args(),
        ));
    }

    fn flush(&self) {
        let _ = self.file().flush();
    }
}
