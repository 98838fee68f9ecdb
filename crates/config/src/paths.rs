use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Paths {
    /// Root of the managed-installs tree. `InstallInfo.plist` and the `Cache`
    /// directory holding downloaded installer items live here.
    pub managed_install_dir: PathBuf,

    /// Directory for the agent's own append-only text logs.
    pub log_dir: PathBuf,

    /// Marker file written once the installer reports it is ready to reboot.
    /// Its presence tells the agent to resume its normal run at next boot.
    pub startup_marker: PathBuf,

    /// Flag file a status display drops when the user presses "Stop".
    pub stop_request_flag: PathBuf,
}

impl Paths {
    pub fn install_info(&self) -> PathBuf {
        self.managed_install_dir.join("InstallInfo.plist")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.managed_install_dir.join("Cache")
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            managed_install_dir: PathBuf::from("/Library/Managed Installs"),
            log_dir: PathBuf::from("/Library/Managed Installs/Logs"),
            startup_marker: PathBuf::from(
                "/Users/Shared/.com.googlecode.munki.checkandinstallatstartup",
            ),
            stop_request_flag: PathBuf::from(
                "/private/tmp/com.googlecode.munki.managedsoftwareupdate.stop_requested",
            ),
        }
    }
}
