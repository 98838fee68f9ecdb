#![forbid(unsafe_code)]

use crate::error::Error;
use crate::processes::{ProcessRecord, ProcessSource};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::trace;

/// Process source backed by `ps -axww -o pid=,user=,comm=`.
#[derive(Debug, Clone)]
pub struct PsSource {
    program: PathBuf,
}

impl PsSource {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_owned(),
        }
    }
}

impl Default for PsSource {
    fn default() -> Self {
        Self::new("/bin/ps")
    }
}

impl ProcessSource for PsSource {
    fn list(&self) -> Result<Vec<ProcessRecord>, Error> {
        let output = Command::new(&self.program)
            .args(["-axww", "-o", "pid=,user=,comm="])
            .stdin(Stdio::null())
            .output()
            .map_err(|err| {
                Error::InventoryUnavailable(format!("{}: {err}", self.program.display()))
            })?;

        if !output.status.success() {
            return Err(Error::InventoryUnavailable(format!(
                "{} exited with {}",
                self.program.display(),
                output.status
            )));
        }

        Ok(parse_ps_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse `pid user command` rows. The command is everything after the user
/// column and may contain spaces. Rows that do not fit are dropped.
pub fn parse_ps_output(text: &str) -> Vec<ProcessRecord> {
    text.lines()
        .filter_map(|line| match parse_row(line) {
            Some(record) => Some(record),
            None => {
                trace!(line, "skipping malformed ps row");
                None
            }
        })
        .collect()
}

fn parse_row(line: &str) -> Option<ProcessRecord> {
    let (pid, rest) = line.trim_start().split_once(char::is_whitespace)?;
    let pid = pid.parse().ok()?;
    let (user, command) = rest.trim_start().split_once(char::is_whitespace)?;
    let command = command.trim();
    if command.is_empty() {
        return None;
    }
    Some(ProcessRecord::new(pid, user, command))
}
