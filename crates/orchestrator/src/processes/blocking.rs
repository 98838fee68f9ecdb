#![forbid(unsafe_code)]

use crate::documents::PackageDescriptor;
use crate::processes::{ProcessSnapshot, is_running};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockingReport {
    /// Application names that were checked.
    pub candidates: Vec<String>,
    /// Candidates found running, in candidate order.
    pub running: Vec<String>,
}

impl BlockingReport {
    pub fn any_blocking(&self) -> bool {
        !self.running.is_empty()
    }
}

/// Check every application that would conflict with installing `descriptor`.
///
/// An explicit `blocking_applications` list is used as-is, even when empty.
/// Without one, the bundle names of `installs` entries of type
/// `application` are used instead. All candidates are checked so every
/// blocker can be reported.
pub fn evaluate_blocking(
    descriptor: &PackageDescriptor,
    snapshot: &ProcessSnapshot,
) -> BlockingReport {
    let candidates = descriptor.blocking_candidates();
    debug!(name = ?descriptor.name, ?candidates, "checking for blocking applications");

    let running: Vec<String> = candidates
        .iter()
        .filter(|app| is_running(app, snapshot))
        .cloned()
        .collect();

    if !running.is_empty() {
        info!(name = ?descriptor.name, ?running, "blocking applications are running");
    }

    BlockingReport {
        candidates,
        running,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::InstallItem;
    use crate::processes::ProcessRecord;

    fn table() -> ProcessSnapshot {
        [
            ProcessRecord::new(10, "alice", "/Applications/Safari.app/Contents/MacOS/Safari"),
            ProcessRecord::new(11, "alice", "/Applications/Firefox.app/Contents/MacOS/firefox"),
        ]
        .into_iter()
        .collect()
    }

    fn app_install(path: &str) -> InstallItem {
        InstallItem {
            kind: "application".into(),
            path: path.into(),
        }
    }

    #[test]
    fn explicit_list_reports_running_blockers() {
        let descriptor = PackageDescriptor {
            blocking_applications: Some(vec!["Safari.app".into(), "Mail.app".into()]),
            ..Default::default()
        };
        let report = evaluate_blocking(&descriptor, &table());
        assert!(report.any_blocking());
        assert_eq!(report.running, vec!["Safari.app".to_string()]);
        assert_eq!(report.candidates.len(), 2);
    }

    #[test]
    fn explicit_list_ignores_installs() {
        let descriptor = PackageDescriptor {
            blocking_applications: Some(vec!["Mail.app".into()]),
            installs: vec![app_install("/Applications/Firefox.app")],
            ..Default::default()
        };
        let report = evaluate_blocking(&descriptor, &table());
        assert!(!report.any_blocking());
        assert_eq!(report.candidates, vec!["Mail.app".to_string()]);
    }

    #[test]
    fn empty_explicit_list_blocks_nothing() {
        let descriptor = PackageDescriptor {
            blocking_applications: Some(Vec::new()),
            installs: vec![app_install("/Applications/Firefox.app")],
            ..Default::default()
        };
        assert!(!evaluate_blocking(&descriptor, &table()).any_blocking());
    }

    #[test]
    fn installs_of_type_application_are_derived() {
        let descriptor = PackageDescriptor {
            installs: vec![
                app_install("/Applications/Firefox.app"),
                InstallItem {
                    kind: "file".into(),
                    path: "/Applications/Safari.app".into(),
                },
            ],
            ..Default::default()
        };
        let report = evaluate_blocking(&descriptor, &table());
        assert_eq!(report.candidates, vec!["Firefox.app".to_string()]);
        assert_eq!(report.running, vec!["Firefox.app".to_string()]);
    }

    #[test]
    fn all_blockers_are_collected() {
        let descriptor = PackageDescriptor {
            blocking_applications: Some(vec!["Firefox".into(), "Safari".into()]),
            ..Default::default()
        };
        let report = evaluate_blocking(&descriptor, &table());
        assert_eq!(report.running, vec!["Firefox".to_string(), "Safari".to_string()]);
    }
}
