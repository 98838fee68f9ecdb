#![forbid(unsafe_code)]

use crate::error::Error;
use crate::processes::{ProcessInventory, ProcessSignaller};
use nix::errno::Errno;
use nix::sys::signal::Signal;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogoutReport {
    /// `(user, pid)` pairs whose session owner was killed.
    pub signalled: Vec<(String, u32)>,
    /// Pids that could not be signalled (already gone, or delivery failed).
    pub skipped: Vec<u32>,
}

/// Forces interactive users out by killing their session-owner processes.
pub struct ForceLogout<'a> {
    inventory: &'a ProcessInventory,
    signaller: &'a dyn ProcessSignaller,
    session_owner: String,
    excluded_user: String,
    marker: PathBuf,
}

impl<'a> ForceLogout<'a> {
    pub fn new(
        config: &config::Config,
        inventory: &'a ProcessInventory,
        signaller: &'a dyn ProcessSignaller,
    ) -> Self {
        Self {
            inventory,
            signaller,
            session_owner: config.logout.session_owner.clone(),
            excluded_user: config.logout.excluded_user.clone(),
            marker: config.logout.marker.clone(),
        }
    }

    /// Kill every session owner not belonging to the excluded account.
    ///
    /// The marker file is created before any signal is sent. Per-process
    /// delivery failures are skipped; failing to list processes or to create
    /// the marker is returned to the caller.
    pub fn run(&self) -> Result<LogoutReport, Error> {
        let snapshot = self.inventory.try_snapshot()?;

        let mut sessions: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
        for record in snapshot
            .iter()
            .filter(|record| record.executable.starts_with(&self.session_owner))
        {
            sessions
                .entry(record.user.as_str())
                .or_default()
                .push(record.pid);
        }
        sessions.remove(self.excluded_user.as_str());
        debug!(?sessions, "interactive sessions to end");

        File::create(&self.marker)?;

        let mut report = LogoutReport::default();
        for (user, pids) in sessions {
            for pid in pids {
                match self.signaller.signal(pid, Signal::SIGKILL) {
                    Ok(()) => report.signalled.push((user.to_owned(), pid)),
                    Err(Errno::ESRCH) => report.skipped.push(pid),
                    Err(err) => {
                        warn!(user, pid, %err, "failed to end session");
                        report.skipped.push(pid);
                    }
                }
            }
        }

        info!(
            signalled = report.signalled.len(),
            skipped = report.skipped.len(),
            "forced logout"
        );
        Ok(report)
    }
}
