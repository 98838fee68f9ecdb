#![forbid(unsafe_code)]

use crate::error::Error;
use crate::processes::{ProcessRecord, ProcessSource};
use nix::unistd::{Uid, User};
use std::collections::HashMap;
use tracing::trace;

/// Process source reading `/proc` directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcfsSource;

impl ProcfsSource {
    fn user_name(uid: u32, cache: &mut HashMap<u32, String>) -> String {
        cache
            .entry(uid)
            .or_insert_with(|| match User::from_uid(Uid::from_raw(uid)) {
                Ok(Some(user)) => user.name,
                _ => uid.to_string(),
            })
            .clone()
    }

    fn executable(process: &procfs::process::Process) -> Option<String> {
        if let Ok(path) = process.exe() {
            return Some(path.to_string_lossy().into_owned());
        }
        // Other users' exe links are unreadable without privileges; argv[0]
        // still names the binary for most launches.
        if let Some(first) = process
            .cmdline()
            .ok()
            .and_then(|cmdline| cmdline.into_iter().next())
            .filter(|first| !first.is_empty())
        {
            return Some(first);
        }
        process.stat().ok().map(|stat| stat.comm)
    }
}

impl ProcessSource for ProcfsSource {
    fn list(&self) -> Result<Vec<ProcessRecord>, Error> {
        let mut users = HashMap::new();
        let mut records = Vec::new();

        for process in procfs::process::all_processes()? {
            let process = match process {
                Ok(p) => p,
                Err(err) => {
                    trace!(?err, "failed to read process entry");
                    continue;
                }
            };
            let Ok(pid) = u32::try_from(process.pid) else {
                continue;
            };
            let Some(executable) = Self::executable(&process) else {
                trace!(pid, "no executable for process");
                continue;
            };
            let user = match process.uid() {
                Ok(uid) => Self::user_name(uid, &mut users),
                Err(err) => {
                    trace!(pid, ?err, "failed to read process owner");
                    continue;
                }
            };
            records.push(ProcessRecord::new(pid, user, executable));
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_current_process() {
        let records = ProcfsSource.list().unwrap();
        let me = std::process::id();
        assert!(records.iter().any(|record| record.pid == me));
    }
}
