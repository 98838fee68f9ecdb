#![forbid(unsafe_code)]

pub mod clock;
pub mod diskimage;
pub mod documents;
pub mod error;
pub mod install_log;
pub mod osinstall;
pub mod processes;
pub mod status;

pub use diskimage::{DiskImageService, Hdiutil, has_disk_image_extension};
pub use documents::{
    InstallInfo, InstallItem, ManagedInstall, PackageDescriptor, read_install_info,
    read_installer_os_version, read_package_descriptor,
};
pub use error::{Error, OsInstallError, OsInstallErrorKind};
pub use install_log::{FileLogSink, INSTALL_LOG, LogSink, MAIN_LOG};
pub use osinstall::{
    ChildLauncher, FinishingTasks, OsInstallReport, OsInstallRunner, OsInstallServices,
    SignalBroadcast, UnixSignalListener, load_install_info, run_pending_os_install,
};
pub use processes::{
    BlockingReport, ForceLogout, LogoutReport, NixSignaller, ProcessInventory, ProcessRecord,
    ProcessSignaller, ProcessSnapshot, ProcessSource, PsSource, evaluate_blocking, is_running,
};
pub use status::{INDETERMINATE, StatusDisplay, TracingStatus};

pub use clock::{Clock, SystemClock};
