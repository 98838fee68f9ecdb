use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::path::PathBuf;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OsInstall {
    /// Longest stretch of silence on the installer's output before the run is
    /// treated as hung and stopped. **Measured in seconds**.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub stall_timeout: Duration,

    /// How long to wait between polls of the installer's output when no line
    /// is available. Every empty poll adds this much to the silence counter.
    /// **Measured in milliseconds**.
    #[serde_as(as = "serde_with::DurationMilliSeconds")]
    pub poll_interval: Duration,

    /// Delay the installer waits before rebooting once released.
    /// **Measured in seconds**.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub reboot_delay: Duration,

    /// Process name of the installer binary. The reply to the ready-to-reboot
    /// handshake is broadcast to every process with this name.
    pub installer_process_name: String,

    /// Installers older than this version require `--volume /`; this version
    /// and newer reject it.
    pub volume_flag_threshold: String,

    /// Candidate locations of the pseudo-terminal wrapper, tried in order.
    ///
    /// # Note
    ///
    /// A `ptyexec` in the running binary's own directory is always tried
    /// before these.
    pub ptyexec_paths: Vec<PathBuf>,

    /// Terminal-emulation command used when no `ptyexec` is found. The
    /// installer invocation is appended to it.
    pub script_fallback: Vec<String>,

    /// Process-listing utility used by the `ps` process source.
    pub ps_program: PathBuf,
}

impl Default for OsInstall {
    fn default() -> Self {
        Self {
            stall_timeout: Duration::from_secs(2 * 60 * 60),
            poll_interval: Duration::from_millis(1000),
            reboot_delay: Duration::from_secs(300),
            installer_process_name: "startosinstall".to_owned(),
            volume_flag_threshold: "10.12.4".to_owned(),
            ptyexec_paths: vec![PathBuf::from("/usr/local/munki/ptyexec")],
            script_fallback: ["/usr/bin/script", "-q", "-t", "1", "/dev/null"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            ps_program: PathBuf::from("/bin/ps"),
        }
    }
}
