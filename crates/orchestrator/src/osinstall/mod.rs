#![forbid(unsafe_code)]

//! Supervision of an in-place macOS upgrade through `startosinstall`.

pub mod classify;
pub mod command;
pub mod handshake;
pub mod job;
pub mod pending;
pub mod resolve;
pub mod runner;
pub mod version;

pub use classify::Progress;
pub use command::{
    InstallerCommand, LaunchSettings, Wrapper, build_installer_command, needs_volume_flag,
};
pub use handshake::{HandshakeListener, HandshakeResponder, SignalBroadcast, UnixSignalListener};
pub use job::{ChildLauncher, InstallerJob, JobLauncher};
pub use pending::{load_install_info, run_pending_os_install};
pub use resolve::{
    CatalogInfo, INSTALLER_BINARY, catalog_info, find_installer_app, installer_binary,
};
pub use runner::{FinishingTasks, OsInstallReport, OsInstallRunner, OsInstallServices};
pub use version::LooseVersion;
