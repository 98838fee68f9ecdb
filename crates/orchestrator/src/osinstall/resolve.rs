#![forbid(unsafe_code)]

use crate::documents::{OS_INSTALLER_TYPE, read_installer_os_version};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Installer binary inside an OS installer application bundle.
pub const INSTALLER_BINARY: &str = "Contents/Resources/startosinstall";

pub fn installer_binary(app_path: &Path) -> PathBuf {
    app_path.join(INSTALLER_BINARY)
}

/// First top-level entry of `dir` (in name order) that contains the installer
/// binary.
pub fn find_installer_app(dir: &Path) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .collect(),
        Err(err) => {
            trace!(dir = %dir.display(), %err, "cannot list directory");
            return None;
        }
    };
    entries.sort();
    entries
        .into_iter()
        .find(|candidate| installer_binary(candidate).exists())
}

/// Roughly 8.8 GB, the space Apple asks for before an upgrade.
const INSTALLED_SIZE_KB: u64 = 9_227_469;
const MINIMUM_AGENT_VERSION: &str = "3.0.0.3211";
const MINIMUM_OS_VERSION: &str = "10.8";

/// Package description for an OS installer found on a mounted disk image,
/// ready to be written out as a property list and imported into a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogInfo {
    #[serde(rename = "RestartAction")]
    pub restart_action: String,
    pub apple_item: bool,
    pub description: String,
    pub display_name: String,
    pub installed_size: u64,
    pub installer_type: String,
    pub minimum_munki_version: String,
    pub minimum_os_version: String,
    pub name: String,
    pub uninstallable: bool,
    pub version: String,
}

/// Describe the installer application on the image mounted at `mount_point`.
pub fn catalog_info(mount_point: &Path) -> Option<CatalogInfo> {
    let app = find_installer_app(mount_point)?;
    let display_name = app.file_stem()?.to_string_lossy().into_owned();
    let version = read_installer_os_version(&app);
    Some(CatalogInfo {
        restart_action: "RequireRestart".into(),
        apple_item: true,
        description: format!("Installs macOS version {version}"),
        name: display_name.replace(' ', "_"),
        display_name,
        installed_size: INSTALLED_SIZE_KB,
        installer_type: OS_INSTALLER_TYPE.into(),
        minimum_munki_version: MINIMUM_AGENT_VERSION.into(),
        minimum_os_version: MINIMUM_OS_VERSION.into(),
        uninstallable: false,
        version,
    })
}
