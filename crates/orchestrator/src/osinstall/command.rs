#![forbid(unsafe_code)]

use crate::osinstall::resolve::installer_binary;
use crate::osinstall::version::LooseVersion;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Program that gives the installer a pseudo-terminal so it prints progress
/// line by line instead of buffering until exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wrapper {
    Ptyexec(PathBuf),
    /// Generic terminal emulation, e.g. `script -q -t 1 /dev/null`. Works, but
    /// burns CPU polling a stdin that never delivers anything.
    Script(Vec<String>),
}

impl Wrapper {
    /// First existing `ptyexec` candidate, else the `script` fallback.
    pub fn resolve(candidates: &[PathBuf], fallback: &[String]) -> Self {
        match candidates.iter().find(|path| path.exists()) {
            Some(path) => Self::Ptyexec(path.clone()),
            None => Self::Script(fallback.to_vec()),
        }
    }

    /// `ptyexec` next to the running binary, then the configured locations.
    pub fn candidates(config: &config::Config) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            candidates.push(dir.join("ptyexec"));
        }
        candidates.extend(config.osinstall.ptyexec_paths.iter().cloned());
        candidates
    }

    fn argv(&self) -> Vec<String> {
        match self {
            Self::Ptyexec(path) => vec![path.to_string_lossy().into_owned()],
            Self::Script(argv) => argv.clone(),
        }
    }
}

/// Fully built installer invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerCommand {
    pub argv: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl InstallerCommand {
    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }
}

/// Inputs to [`build_installer_command`] that do not come from the bundle.
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub reboot_delay: Duration,
    /// Pid the installer signals when it is ready to reboot.
    pub pid_to_signal: u32,
    pub volume_flag_threshold: String,
}

/// Installers before the threshold require `--volume`; later ones reject it.
pub fn needs_volume_flag(os_version: &str, threshold: &str) -> bool {
    LooseVersion::parse(os_version) < LooseVersion::parse(threshold)
}

pub fn build_installer_command(
    wrapper: &Wrapper,
    app_path: &Path,
    os_version: &str,
    settings: &LaunchSettings,
) -> InstallerCommand {
    let app = app_path.to_string_lossy().into_owned();
    let mut argv = wrapper.argv();
    argv.push(installer_binary(app_path).to_string_lossy().into_owned());
    argv.extend([
        "--agreetolicense".to_owned(),
        "--applicationpath".to_owned(),
        app,
        "--rebootdelay".to_owned(),
        settings.reboot_delay.as_secs().to_string(),
        "--pidtosignal".to_owned(),
        settings.pid_to_signal.to_string(),
        "--nointeraction".to_owned(),
    ]);
    if needs_volume_flag(os_version, &settings.volume_flag_threshold) {
        argv.extend(["--volume".to_owned(), "/".to_owned()]);
    }

    let env = BTreeMap::from([("NSUnbufferedIO".to_owned(), "YES".to_owned())]);
    debug!(?argv, "installer command");
    InstallerCommand { argv, env }
}
