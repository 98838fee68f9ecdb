#![forbid(unsafe_code)]

mod blocking;
mod logout;
mod matcher;
#[cfg(target_os = "linux")]
mod procfs_source;
mod ps_source;

pub use blocking::{BlockingReport, evaluate_blocking};
pub use logout::{ForceLogout, LogoutReport};
pub use matcher::{is_running, matching_processes};
#[cfg(target_os = "linux")]
pub use procfs_source::ProcfsSource;
pub use ps_source::{PsSource, parse_ps_output};

use crate::error::Error;
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tracing::{debug, trace, warn};

/// One row of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub user: String,
    pub executable: String,
}

impl ProcessRecord {
    pub fn new(pid: u32, user: impl Into<String>, executable: impl Into<String>) -> Self {
        Self {
            pid,
            user: user.into(),
            executable: executable.into(),
        }
    }

    /// Final path component of the executable.
    pub fn name(&self) -> &str {
        self.executable
            .rsplit('/')
            .next()
            .unwrap_or(self.executable.as_str())
    }
}

/// Immutable view of the process table taken at one point in time.
///
/// An empty snapshot means "unknown", not "nothing is running".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSnapshot {
    records: Vec<ProcessRecord>,
}

impl ProcessSnapshot {
    pub fn new(records: Vec<ProcessRecord>) -> Self {
        Self { records }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.records.iter()
    }

    /// Executables given as absolute paths. Only these take part in
    /// application matching.
    pub fn executable_paths(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .map(|record| record.executable.as_str())
            .filter(|exe| exe.starts_with('/'))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<ProcessRecord> for ProcessSnapshot {
    fn from_iter<I: IntoIterator<Item = ProcessRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

pub trait ProcessSource: Send + Sync {
    /// Read the whole process table once.
    fn list(&self) -> Result<Vec<ProcessRecord>, Error>;
}

pub struct ProcessInventory {
    source: Box<dyn ProcessSource>,
}

impl ProcessInventory {
    pub fn new(source: Box<dyn ProcessSource>) -> Self {
        Self { source }
    }

    /// Inventory backed by the platform's preferred process source.
    pub fn system(config: &config::Config) -> Self {
        #[cfg(target_os = "linux")]
        {
            let _ = config;
            Self::new(Box::new(ProcfsSource))
        }
        #[cfg(not(target_os = "linux"))]
        {
            Self::new(Box::new(PsSource::new(&config.osinstall.ps_program)))
        }
    }

    /// Snapshot the process table, surfacing listing failures.
    pub fn try_snapshot(&self) -> Result<ProcessSnapshot, Error> {
        let records = self.source.list()?;
        trace!(count = records.len(), "process table snapshot");
        Ok(ProcessSnapshot::new(records))
    }

    /// Snapshot the process table. A listing failure yields an empty snapshot.
    pub fn snapshot(&self) -> ProcessSnapshot {
        match self.try_snapshot() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(%err, "process listing failed, treating process table as unknown");
                ProcessSnapshot::default()
            }
        }
    }
}

impl std::fmt::Debug for ProcessInventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessInventory").finish_non_exhaustive()
    }
}

pub trait ProcessSignaller: Send + Sync {
    fn signal(&self, pid: u32, signal: Signal) -> Result<(), Errno>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NixSignaller;

impl ProcessSignaller for NixSignaller {
    fn signal(&self, pid: u32, signal: Signal) -> Result<(), Errno> {
        let pid = i32::try_from(pid).map_err(|_| Errno::ESRCH)?;
        kill(Pid::from_raw(pid), signal)
    }
}

/// Send `signal` to every process whose executable name is `name`.
///
/// Returns the pids that were signalled. Processes that vanished in the
/// meantime are skipped.
pub fn signal_by_name(
    snapshot: &ProcessSnapshot,
    signaller: &dyn ProcessSignaller,
    name: &str,
    signal: Signal,
) -> Result<Vec<u32>, Error> {
    let mut signalled = Vec::new();
    for record in snapshot.iter().filter(|record| record.name() == name) {
        match signaller.signal(record.pid, signal) {
            Ok(()) => signalled.push(record.pid),
            Err(Errno::ESRCH) => {
                debug!(pid = record.pid, name, "process already gone");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(signalled)
}
