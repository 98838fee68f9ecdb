#![forbid(unsafe_code)]

//! Read-only views of the property-list documents the agent consumes.
//!
//! Only the fields this crate acts on are modelled; everything else in the
//! documents is ignored.

use crate::error::Error;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::debug;

/// One entry of a package's `installs` list.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct InstallItem {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub path: String,
}

/// The parts of a package description that decide what blocks its install.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PackageDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub blocking_applications: Option<Vec<String>>,
    #[serde(default)]
    pub installs: Vec<InstallItem>,
}

impl PackageDescriptor {
    /// Application names that must not be running while this package installs.
    pub fn blocking_candidates(&self) -> Vec<String> {
        if let Some(apps) = &self.blocking_applications {
            return apps.clone();
        }
        self.installs
            .iter()
            .filter(|item| item.kind == "application")
            .filter_map(|item| Path::new(&item.path).file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect()
    }
}

/// One item of `managed_installs` in `InstallInfo.plist`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ManagedInstall {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub installer_type: Option<String>,
    #[serde(default)]
    pub installer_item: Option<String>,
    #[serde(default)]
    pub version_to_install: Option<String>,
    #[serde(default)]
    pub blocking_applications: Option<Vec<String>>,
    #[serde(default)]
    pub installs: Vec<InstallItem>,
}

impl ManagedInstall {
    pub fn descriptor(&self) -> PackageDescriptor {
        PackageDescriptor {
            name: self.name.clone(),
            blocking_applications: self.blocking_applications.clone(),
            installs: self.installs.clone(),
        }
    }

    pub fn is_os_installer(&self) -> bool {
        self.installer_type.as_deref() == Some(OS_INSTALLER_TYPE)
    }
}

pub const OS_INSTALLER_TYPE: &str = "startosinstall";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct InstallInfo {
    #[serde(default)]
    pub managed_installs: Option<Vec<ManagedInstall>>,
}

impl InstallInfo {
    /// First pending OS upgrade that names an installer item.
    pub fn pending_os_install(&self) -> Option<&ManagedInstall> {
        self.managed_installs
            .as_deref()?
            .iter()
            .find(|item| item.is_os_installer())
            .filter(|item| item.installer_item.is_some())
    }
}

#[derive(Debug, Deserialize)]
struct InstallerMetadata {
    #[serde(rename = "System Image Info")]
    system_image_info: SystemImageInfo,
}

#[derive(Debug, Deserialize)]
struct SystemImageInfo {
    version: String,
}

/// Deserialize a property list, reporting any failure as an invalid document.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    plist::from_file(path).map_err(|err| Error::DocumentInvalid {
        path: path.to_owned(),
        reason: err.to_string(),
    })
}

pub fn read_install_info(path: &Path) -> Result<InstallInfo, Error> {
    read_document(path)
}

pub fn read_package_descriptor(path: &Path) -> Result<PackageDescriptor, Error> {
    read_document(path)
}

/// OS version an installer application will install, or an empty string when
/// the bundle metadata is missing or unreadable.
pub fn read_installer_os_version(app_path: &Path) -> String {
    let metadata = app_path.join("Contents/SharedSupport/InstallInfo.plist");
    if !metadata.is_file() {
        return String::new();
    }
    match read_document::<InstallerMetadata>(&metadata) {
        Ok(info) => info.system_image_info.version,
        Err(err) => {
            debug!(%err, "installer version unknown");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plist::{Dictionary, Value};
    use tempfile::tempdir;

    fn dict(entries: Vec<(&str, Value)>) -> Value {
        let mut dict = Dictionary::new();
        for (key, value) in entries {
            dict.insert(key.to_owned(), value);
        }
        Value::Dictionary(dict)
    }

    #[test]
    fn reads_installer_version() {
        let dir = tempdir().unwrap();
        let app = dir.path().join("Install macOS Sierra.app");
        let support = app.join("Contents/SharedSupport");
        std::fs::create_dir_all(&support).unwrap();
        dict(vec![(
            "System Image Info",
            dict(vec![("version", Value::String("10.12.6".into()))]),
        )])
        .to_file_xml(support.join("InstallInfo.plist"))
        .unwrap();

        assert_eq!(read_installer_os_version(&app), "10.12.6");
    }

    #[test]
    fn unreadable_installer_version_is_unknown() {
        let dir = tempdir().unwrap();
        let app = dir.path().join("Install.app");
        assert_eq!(read_installer_os_version(&app), "");

        let support = app.join("Contents/SharedSupport");
        std::fs::create_dir_all(&support).unwrap();
        std::fs::write(support.join("InstallInfo.plist"), "not a plist").unwrap();
        assert_eq!(read_installer_os_version(&app), "");

        dict(vec![("System Image Info", dict(vec![]))])
            .to_file_xml(support.join("InstallInfo.plist"))
            .unwrap();
        assert_eq!(read_installer_os_version(&app), "");
    }

    #[test]
    fn install_info_selects_first_os_installer_with_item() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("InstallInfo.plist");
        dict(vec![(
            "managed_installs",
            Value::Array(vec![
                dict(vec![
                    ("name", Value::String("Firefox".into())),
                    ("installer_type", Value::String("copy_from_dmg".into())),
                    ("installer_item", Value::String("Firefox.dmg".into())),
                ]),
                dict(vec![
                    ("name", Value::String("macOS".into())),
                    ("installer_type", Value::String("startosinstall".into())),
                    ("installer_item", Value::String("Install macOS.dmg".into())),
                    ("version_to_install", Value::String("10.13.1".into())),
                    (
                        "blocking_applications",
                        Value::Array(vec![Value::String("Safari.app".into())]),
                    ),
                ]),
            ]),
        )])
        .to_file_xml(&path)
        .unwrap();

        let info = read_install_info(&path).unwrap();
        let item = info.pending_os_install().unwrap();
        assert_eq!(item.installer_item.as_deref(), Some("Install macOS.dmg"));
        assert_eq!(item.version_to_install.as_deref(), Some("10.13.1"));
        assert_eq!(
            item.descriptor().blocking_candidates(),
            vec!["Safari.app".to_string()]
        );
    }

    #[test]
    fn invalid_document_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("InstallInfo.plist");
        std::fs::write(&path, "{{{").unwrap();
        assert!(matches!(
            read_install_info(&path),
            Err(Error::DocumentInvalid { .. })
        ));
    }
}
