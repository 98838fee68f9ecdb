#![forbid(unsafe_code)]

use config::Config;
use nix::errno::Errno;
use nix::sys::signal::Signal;
use orchestrator::error::Error;
use orchestrator::{ForceLogout, ProcessInventory, ProcessRecord, ProcessSignaller, ProcessSource};
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::tempdir;

const LOGINWINDOW: &str = "/System/Library/CoreServices/loginwindow.app/Contents/MacOS/loginwindow";

struct StaticSource(Vec<ProcessRecord>);

impl ProcessSource for StaticSource {
    fn list(&self) -> Result<Vec<ProcessRecord>, Error> {
        Ok(self.0.clone())
    }
}

struct BrokenSource;

impl ProcessSource for BrokenSource {
    fn list(&self) -> Result<Vec<ProcessRecord>, Error> {
        Err(Error::InventoryUnavailable("ps exited with status 1".into()))
    }
}

/// Records each delivery along with whether the marker existed at that time.
struct MarkerCheckingSignaller {
    marker: PathBuf,
    gone: Vec<u32>,
    failing: Vec<u32>,
    calls: Mutex<Vec<(u32, Signal, bool)>>,
}

impl MarkerCheckingSignaller {
    fn new(marker: PathBuf) -> Self {
        Self {
            marker,
            gone: Vec::new(),
            failing: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ProcessSignaller for MarkerCheckingSignaller {
    fn signal(&self, pid: u32, signal: Signal) -> Result<(), Errno> {
        self.calls
            .lock()
            .unwrap()
            .push((pid, signal, self.marker.exists()));
        if self.gone.contains(&pid) {
            return Err(Errno::ESRCH);
        }
        if self.failing.contains(&pid) {
            return Err(Errno::EPERM);
        }
        Ok(())
    }
}

fn process_table() -> Vec<ProcessRecord> {
    vec![
        ProcessRecord::new(88, "root", LOGINWINDOW),
        ProcessRecord::new(412, "alice", LOGINWINDOW),
        ProcessRecord::new(413, "alice", "/Applications/Safari.app/Contents/MacOS/Safari"),
        ProcessRecord::new(977, "bob", LOGINWINDOW),
        ProcessRecord::new(1001, "carol", LOGINWINDOW),
    ]
}

fn config_with_marker(marker: PathBuf) -> Config {
    let mut config = Config::default();
    config.logout.marker = marker;
    config
}

#[test]
fn kills_user_sessions_after_writing_marker() {
    let dir = tempdir().unwrap();
    let marker = dir.path().join("com.googlecode.munki.installatlogout");
    let config = config_with_marker(marker.clone());
    let inventory = ProcessInventory::new(Box::new(StaticSource(process_table())));
    let signaller = MarkerCheckingSignaller::new(marker.clone());

    let report = ForceLogout::new(&config, &inventory, &signaller).run().unwrap();

    let calls = signaller.calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![
            (412, Signal::SIGKILL, true),
            (977, Signal::SIGKILL, true),
            (1001, Signal::SIGKILL, true),
        ]
    );
    assert_eq!(
        report.signalled,
        vec![
            ("alice".to_owned(), 412),
            ("bob".to_owned(), 977),
            ("carol".to_owned(), 1001),
        ]
    );
    assert!(report.skipped.is_empty());
    assert!(marker.exists());
}

#[test]
fn delivery_failures_are_skipped_not_fatal() {
    let dir = tempdir().unwrap();
    let marker = dir.path().join("installatlogout");
    let config = config_with_marker(marker.clone());
    let inventory = ProcessInventory::new(Box::new(StaticSource(process_table())));
    let mut signaller = MarkerCheckingSignaller::new(marker);
    signaller.gone = vec![412];
    signaller.failing = vec![977];

    let report = ForceLogout::new(&config, &inventory, &signaller).run().unwrap();

    assert_eq!(report.signalled, vec![("carol".to_owned(), 1001)]);
    assert_eq!(report.skipped, vec![412, 977]);
    assert_eq!(signaller.calls.lock().unwrap().len(), 3);
}

#[test]
fn listing_failure_is_reported_without_signalling() {
    let dir = tempdir().unwrap();
    let marker = dir.path().join("installatlogout");
    let config = config_with_marker(marker.clone());
    let inventory = ProcessInventory::new(Box::new(BrokenSource));
    let signaller = MarkerCheckingSignaller::new(marker.clone());

    let err = ForceLogout::new(&config, &inventory, &signaller)
        .run()
        .unwrap_err();

    assert!(matches!(err, Error::InventoryUnavailable(_)));
    assert!(signaller.calls.lock().unwrap().is_empty());
    assert!(!marker.exists());
}

#[test]
fn marker_failure_is_reported_without_signalling() {
    let dir = tempdir().unwrap();
    let marker = dir.path().join("missing-dir/installatlogout");
    let config = config_with_marker(marker.clone());
    let inventory = ProcessInventory::new(Box::new(StaticSource(process_table())));
    let signaller = MarkerCheckingSignaller::new(marker);

    let err = ForceLogout::new(&config, &inventory, &signaller)
        .run()
        .unwrap_err();

    assert!(matches!(err, Error::Io(_)));
    assert!(signaller.calls.lock().unwrap().is_empty());
}

#[test]
fn only_excluded_sessions_means_nothing_to_do() {
    let dir = tempdir().unwrap();
    let marker = dir.path().join("installatlogout");
    let config = config_with_marker(marker.clone());
    let inventory = ProcessInventory::new(Box::new(StaticSource(vec![ProcessRecord::new(
        88,
        "root",
        LOGINWINDOW,
    )])));
    let signaller = MarkerCheckingSignaller::new(marker);

    let report = ForceLogout::new(&config, &inventory, &signaller).run().unwrap();

    assert_eq!(report, Default::default());
    assert!(signaller.calls.lock().unwrap().is_empty());
}
