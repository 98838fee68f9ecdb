#![forbid(unsafe_code)]

use crate::error::Error;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::{debug, info, warn};

const DISK_IMAGE_EXTENSIONS: &[&str] = &["dmg", "iso", "sparseimage", "sparsebundle"];

/// Whether `path` names a disk image by its extension.
pub fn has_disk_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            DISK_IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

pub trait DiskImageService: Send + Sync {
    /// Attach an image read-only and return its mount points (empty if none).
    fn mount(&self, image: &Path) -> Result<Vec<PathBuf>, Error>;
    fn unmount(&self, mount_point: &Path) -> Result<(), Error>;
}

#[derive(Debug, Deserialize)]
struct AttachReply {
    #[serde(rename = "system-entities", default)]
    entities: Vec<AttachedEntity>,
}

#[derive(Debug, Deserialize)]
struct AttachedEntity {
    #[serde(rename = "mount-point", default)]
    mount_point: Option<PathBuf>,
}

/// Mount points listed in an `hdiutil attach -plist` reply.
pub fn parse_attach_reply(reply: &[u8]) -> Result<Vec<PathBuf>, Error> {
    let reply: AttachReply = plist::from_bytes(reply)
        .map_err(|err| Error::DiskImage(format!("unreadable hdiutil reply: {err}")))?;
    Ok(reply
        .entities
        .into_iter()
        .filter_map(|entity| entity.mount_point)
        .collect())
}

#[derive(Debug, Clone)]
pub struct Hdiutil {
    program: PathBuf,
}

impl Default for Hdiutil {
    fn default() -> Self {
        Self {
            program: PathBuf::from("/usr/bin/hdiutil"),
        }
    }
}

impl Hdiutil {
    pub(crate) fn attach_command(&self, image: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("attach")
            .arg(image)
            .arg("-readonly")
            .arg("-nobrowse")
            .arg("-noverify")
            .arg("-plist");
        command
    }

    pub(crate) fn detach_command(&self, mount_point: &Path, force: bool) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("detach").arg(mount_point);
        if force {
            command.arg("-force");
        }
        command
    }

    fn run(mut command: Command) -> Result<Output, Error> {
        Ok(command.stdin(Stdio::null()).output()?)
    }
}

impl DiskImageService for Hdiutil {
    fn mount(&self, image: &Path) -> Result<Vec<PathBuf>, Error> {
        info!(image = %image.display(), "mounting disk image");
        let output = Self::run(self.attach_command(image))?;
        if !output.status.success() {
            return Err(Error::DiskImage(format!(
                "hdiutil attach {} failed: {}",
                image.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let mount_points = parse_attach_reply(&output.stdout)?;
        debug!(?mount_points, "disk image mounted");
        Ok(mount_points)
    }

    fn unmount(&self, mount_point: &Path) -> Result<(), Error> {
        let output = Self::run(self.detach_command(mount_point, false))?;
        if output.status.success() {
            return Ok(());
        }
        warn!(
            mount_point = %mount_point.display(),
            "polite unmount failed, forcing"
        );
        let output = Self::run(self.detach_command(mount_point, true))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::DiskImage(format!(
                "hdiutil detach {} failed: {}",
                mount_point.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}
