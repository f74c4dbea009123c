// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Simple console backend for the [`log`] crate.
//!
//! Records go to stderr, so the machine-readable payload on stdout stays clean. Optionally, every record is
//! mirrored into a log file as well.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::Mutex,
    time::{SystemTime, UNIX_EPOCH},
};

use log::{LevelFilter, Metadata, Record};

/// A simple logging backend for the console.
pub struct ConsoleLogger {
    /// The most verbose level that is printed.
    level: LevelFilter,

    /// The file that records are mirrored into.
    mirror: Option<Mutex<File>>,
}

impl ConsoleLogger {
    /// Constructs a new [`ConsoleLogger`].
    #[must_use = "Has no effect if the result is unused"]
    pub const fn new(level: LevelFilter) -> Self {
        Self {
            level,
            mirror: None,
        }
    }

    /// Mirrors every record into a file, appending to it if it exists.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the file could not be opened.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.mirror = Some(Mutex::new(file));
        Ok(self)
    }

    /// Leaks the logger and installs it as the global logger.
    ///
    /// # Errors
    ///
    /// May return an `Error` if a logger was already installed.
    pub fn install(self) -> Result<(), log::SetLoggerError> {
        let level = self.level;
        log::set_logger(Box::leak(Box::new(self)))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let time = clock_time();
            let level = record.level();
            let file = record.file().unwrap_or_default();
            let line = record.line().unwrap_or_default();
            let args = record.args();
            let text = format!("[{time} {level} {file}:{line}] - {args}\n");

            let _ = std::io::stderr().write_all(text.as_bytes());
            if let Some(mirror) = &self.mirror
                && let Ok(mut file) = mirror.lock()
            {
                let _ = file.write_all(text.as_bytes());
            }
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
        if let Some(mirror) = &self.mirror
            && let Ok(mut file) = mirror.lock()
        {
            let _ = file.flush();
        }
    }
}

/// Returns the current UTC wall clock time as `HH:MM:SS`.
fn clock_time() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |x| x.as_secs());
    let day = secs % 86_400;
    format!("{:02}:{:02}:{:02}", day / 3600, day % 3600 / 60, day % 60)
}
