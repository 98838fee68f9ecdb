#![forbid(unsafe_code)]

use std::fmt;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Process listing unavailable: {0}")]
    InventoryUnavailable(String),

    #[error("Invalid document {path}: {reason}")]
    DocumentInvalid { path: PathBuf, reason: String },

    #[error("Disk image operation failed: {0}")]
    DiskImage(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to deliver signal: {0}")]
    Signal(#[from] nix::Error),

    #[error(transparent)]
    OsInstall(#[from] OsInstallError),
}

#[cfg(target_os = "linux")]
impl From<procfs::ProcError> for Error {
    fn from(err: procfs::ProcError) -> Self {
        Self::InventoryUnavailable(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsInstallErrorKind {
    InstallerNotFound,
    MountFailure,
    LaunchFailure,
    StallTimeout,
    NonZeroExit(i32),
    HandshakeMissing,
    Cancelled,
}

impl fmt::Display for OsInstallErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstallerNotFound => f.write_str("installer not found"),
            Self::MountFailure => f.write_str("mount failure"),
            Self::LaunchFailure => f.write_str("launch failure"),
            Self::StallTimeout => f.write_str("stall timeout"),
            Self::NonZeroExit(code) => write!(f, "non-zero exit ({code})"),
            Self::HandshakeMissing => f.write_str("handshake missing"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Failure of one OS install attempt, with whatever the installer printed
/// before it failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct OsInstallError {
    pub kind: OsInstallErrorKind,
    pub message: String,
    pub transcript: Vec<String>,
}

impl OsInstallError {
    pub fn new(kind: OsInstallErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            transcript: Vec::new(),
        }
    }

    pub fn with_transcript(mut self, transcript: Vec<String>) -> Self {
        self.transcript = transcript;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_install_error_displays_message_only() {
        let err = OsInstallError::new(
            OsInstallErrorKind::NonZeroExit(255),
            "startosinstall failed with return code 255",
        )
        .with_transcript(vec!["line".into()]);
        assert_eq!(err.to_string(), "startosinstall failed with return code 255");
        assert_eq!(err.kind.to_string(), "non-zero exit (255)");

        let wrapped = Error::from(err);
        assert!(matches!(
            wrapped,
            Error::OsInstall(OsInstallError {
                kind: OsInstallErrorKind::NonZeroExit(255),
                ..
            })
        ));
    }
}
