#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::path::{Path, PathBuf};

/// osupgrade: supervised in-place macOS upgrades for managed machines
///
/// Checks whether conflicting applications are running, can force
/// interactive users to log out, and drives `startosinstall` through to the
/// point where the machine reboots into the upgrade.
#[derive(Debug, Parser, Clone)]
#[command(about, long_about, version)]
pub struct Cli {
    /// Path to configuration file.
    ///
    /// If not provided, the default locations are checked. They are
    /// `/etc/osupgrade/config.toml` and `/etc/osupgrade/config.d/*.toml`,
    /// where the latter being a glob pattern. If they don't exist, the default
    /// configuration is used.
    #[arg(short, long, value_parser = validate_file)]
    pub conffile: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,
}

#[derive(Debug, Subcommand, Clone, PartialEq, Eq)]
pub enum Command {
    /// Report applications that would block installing a package.
    ///
    /// Exits with status 1 when any blocking application is running.
    CheckBlocking {
        /// Package description (property list) to check.
        #[arg(long, value_parser = validate_file)]
        pkginfo: PathBuf,
    },

    /// Log out every interactive user except the excluded account.
    ForceLogout,

    /// Print the package description of a macOS installer on a mounted disk
    /// image as a property list.
    CatalogInfo {
        /// Directory the disk image is mounted at.
        mount_point: PathBuf,
    },

    /// Run the pending macOS upgrade listed in `InstallInfo.plist`.
    InstallOs {
        /// Log users out instead of refusing when blocking applications run.
        #[arg(long)]
        force_logout: bool,
    },
}

/// Check if the file exists.
#[inline(always)]
fn validate_file(file: &str) -> Result<PathBuf, String> {
    let path = Path::new(file);
    if path.exists() {
        Ok(path.to_owned())
    } else {
        Err(format!("File not found: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::NamedTempFile;

    #[test]
    fn parser_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn install_os_flags() {
        let cli = Cli::try_parse_from(["osupgrade", "install-os", "--force-logout"]).unwrap();
        assert_eq!(cli.command, Command::InstallOs { force_logout: true });

        let cli = Cli::try_parse_from(["osupgrade", "-q", "install-os"]).unwrap();
        assert_eq!(cli.command, Command::InstallOs { force_logout: false });
        assert_eq!(cli.conffile, None);
    }

    #[test]
    fn catalog_info_takes_a_mount_point() {
        let cli = Cli::try_parse_from(["osupgrade", "catalog-info", "/Volumes/Install"]).unwrap();
        assert_eq!(
            cli.command,
            Command::CatalogInfo {
                mount_point: PathBuf::from("/Volumes/Install")
            }
        );
        assert!(Cli::try_parse_from(["osupgrade", "catalog-info"]).is_err());
    }

    #[test]
    fn files_must_exist() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();

        let cli = Cli::try_parse_from(["osupgrade", "check-blocking", "--pkginfo", path]).unwrap();
        assert_eq!(
            cli.command,
            Command::CheckBlocking {
                pkginfo: file.path().to_owned()
            }
        );
        assert!(Cli::try_parse_from(["osupgrade", "-c", path, "force-logout"]).is_ok());

        let missing = ["osupgrade", "check-blocking", "--pkginfo", "/nonexistent/pkginfo.plist"];
        assert!(Cli::try_parse_from(missing).is_err());
        assert!(validate_file("/nonexistent/config.toml").is_err());
    }
}
