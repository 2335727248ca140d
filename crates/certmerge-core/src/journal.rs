//! Run journal: an explicit logging sink.
//!
//! Constructed once per run and passed by reference into the controller
//! and the substitution engine; there is no process-wide mutable logger
//! state. Every message is mirrored to the `log` facade (so `RUST_LOG`
//! filtering still applies on the console) and, when a log directory is
//! available, appended to a dated run log file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::Local;

/// Logging sink for one generation run.
#[derive(Debug)]
pub struct Journal {
    file: Option<Mutex<BufWriter<File>>>,
}

impl Journal {
    /// Open a journal writing to `<log_dir>/certmerge_YYYYMMDD.log`.
    ///
    /// Failure to create the directory or the file degrades to a
    /// console-only journal; a run never fails because of its log file.
    #[must_use]
    pub fn open(log_dir: &Path) -> Self {
        let file = Self::open_log_file(log_dir);
        if file.is_none() {
            log::warn!(
                "could not open run log under {}, logging to console only",
                log_dir.display()
            );
        }
        Self { file }
    }

    /// Console-only journal, used by tests and the read-only subcommands.
    #[must_use]
    pub fn disabled() -> Self {
        Self { file: None }
    }

    fn open_log_file(log_dir: &Path) -> Option<Mutex<BufWriter<File>>> {
        fs::create_dir_all(log_dir).ok()?;
        let name = format!("certmerge_{}.log", Local::now().format("%Y%m%d"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join(name))
            .ok()?;
        Some(Mutex::new(BufWriter::new(file)))
    }

    fn write_line(&self, level: &str, message: &str) {
        if let Some(file) = &self.file {
            let mut guard = file.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
            let _ = writeln!(guard, "{stamp} - {level} - {message}");
        }
    }

    /// Informational progress message.
    pub fn info(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        log::info!("{message}");
        self.write_line("INFO", message);
    }

    /// Recoverable problem; the run continues.
    pub fn warn(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        log::warn!("{message}");
        self.write_line("WARNING", message);
    }

    /// Failure worth surfacing to the operator.
    pub fn error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        log::error!("{message}");
        self.write_line("ERROR", message);
    }

    /// Per-region diagnostics; file-only noise level.
    pub fn debug(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        log::debug!("{message}");
        self.write_line("DEBUG", message);
    }

    /// Flush the log file at run end.
    pub fn flush(&self) {
        if let Some(file) = &self.file {
            let mut guard = file.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let _ = guard.flush();
        }
    }
}

impl Drop for Journal {
    fn drop(&mut self) {
        self.flush();
    }
}
