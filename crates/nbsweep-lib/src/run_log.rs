//! The per-run text log
//!
//! One `RunLog` is opened by the driver at the start of a run and handed by
//! `&mut` reference to every stage that records events. Each entry is written
//! straight to the file and flushed, so an aborted run still leaves every
//! completed entry on disk. Entries are mirrored to `tracing` as well.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

const BANNER_WIDTH: usize = 75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

pub struct RunLog {
    file: File,
    path: PathBuf,
    run_id: String,
    entries: usize,
}

impl RunLog {
    /// Open the log in truncate mode, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        let mut log = Self {
            file,
            path,
            run_id: uuid::Uuid::new_v4().to_string(),
            entries: 0,
        };
        let header = format!(
            "# RUN {} started {}",
            log.run_id,
            chrono::Utc::now().to_rfc3339()
        );
        log.record(Level::Info, &header)?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Number of entries written so far, header included.
    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn info(&mut self, message: &str) -> io::Result<()> {
        self.record(Level::Info, message)
    }

    pub fn warn(&mut self, message: &str) -> io::Result<()> {
        self.record(Level::Warn, message)
    }

    pub fn error(&mut self, message: &str) -> io::Result<()> {
        self.record(Level::Error, message)
    }

    /// A boxed section heading, used once per repository.
    pub fn banner(&mut self, title: &str) -> io::Result<()> {
        let rule = "#".repeat(BANNER_WIDTH);
        let block = format!("\n{rule}\n#\n# {title}\n#\n{rule}");
        self.record(Level::Info, &block)
    }

    pub fn record(&mut self, level: Level, message: &str) -> io::Result<()> {
        match level {
            Level::Info => info!(target: "run_log", "{message}"),
            Level::Warn => warn!(target: "run_log", "{message}"),
            Level::Error => error!(target: "run_log", "{message}"),
        }
        self.file.write_all(message.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        self.entries += 1;
        Ok(())
    }

    /// Close the log, syncing it to disk.
    pub fn close(mut self) -> io::Result<()> {
        let footer = format!(
            "# RUN {} finished {}",
            self.run_id,
            chrono::Utc::now().to_rfc3339()
        );
        self.record(Level::Info, &footer)?;
        self.file.sync_all()
    }
}
