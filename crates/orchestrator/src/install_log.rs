#![forbid(unsafe_code)]

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::warn;

pub const MAIN_LOG: &str = "ManagedSoftwareUpdate.log";
pub const INSTALL_LOG: &str = "Install.log";

/// Append-only text logs kept alongside the diagnostic output.
pub trait LogSink: Send + Sync {
    fn append(&self, log_name: &str, message: &str);
}

#[derive(Debug, Clone)]
pub struct FileLogSink {
    dir: PathBuf,
}

impl FileLogSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn timestamp() -> String {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let format = format_description!(
            "[month repr:short] [day] [year] [hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute]"
        );
        now.format(format).unwrap_or_default()
    }

    fn try_append(&self, log_name: &str, message: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(log_name))?;
        writeln!(file, "{} {message}", Self::timestamp())
    }
}

impl LogSink for FileLogSink {
    fn append(&self, log_name: &str, message: &str) {
        if let Err(err) = self.try_append(log_name, message) {
            warn!(log_name, %err, "failed to write log line");
        }
    }
}
