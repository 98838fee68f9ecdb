#![forbid(unsafe_code)]

use crate::clock::Clock;
use crate::diskimage::{DiskImageService, has_disk_image_extension};
use crate::documents::read_installer_os_version;
use crate::error::{OsInstallError, OsInstallErrorKind};
use crate::osinstall::classify::Progress;
use crate::osinstall::command::{LaunchSettings, Wrapper, build_installer_command};
use crate::osinstall::handshake::{HandshakeListener, HandshakeResponder};
use crate::osinstall::job::{InstallerJob, JobLauncher};
use crate::osinstall::resolve::find_installer_app;
use crate::status::StatusDisplay;
use config::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

pub struct OsInstallServices {
    pub disk_images: Box<dyn DiskImageService + Send + Sync>,
    pub launcher: Box<dyn JobLauncher + Send + Sync>,
    pub handshake: Box<dyn HandshakeListener + Send + Sync>,
    pub responder: Box<dyn HandshakeResponder + Send + Sync>,
    pub status: Arc<dyn StatusDisplay + Send + Sync>,
    pub clock: Box<dyn Clock + Send + Sync>,
}

/// Work to run once the installer says it is ready to reboot, before it is
/// released.
pub type FinishingTasks = Box<dyn FnOnce() + Send>;

/// Outcome of a successful attempt. The machine will reboot shortly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsInstallReport {
    pub app_path: PathBuf,
    pub os_version: String,
    /// Disk image mount left in place for the installer to finish from.
    pub mount_point: Option<PathBuf>,
    pub transcript: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    Exited(i32),
    Stalled,
    Cancelled,
}

/// State of one orchestration attempt.
#[derive(Debug, Default)]
struct Session {
    app_path: PathBuf,
    os_version: String,
    mount_point: Option<PathBuf>,
    signal_received: bool,
    transcript: Vec<String>,
}

/// Supervises one `startosinstall` run from installer resolution to the
/// ready-to-reboot handshake.
pub struct OsInstallRunner {
    config: Config,
    services: OsInstallServices,
    finishing_tasks: Option<FinishingTasks>,
    session: Session,
}

impl OsInstallRunner {
    pub fn new(config: Config, services: OsInstallServices) -> Self {
        Self {
            config,
            services,
            finishing_tasks: None,
            session: Session::default(),
        }
    }

    pub fn with_finishing_tasks(mut self, tasks: FinishingTasks) -> Self {
        self.finishing_tasks = Some(tasks);
        self
    }

    /// Run the installer found at `installer`, an application bundle or a
    /// disk image holding one.
    ///
    /// On success the installer has been released to reboot the machine and
    /// any disk image it came from is still mounted. Every failure unmounts
    /// the image first.
    pub async fn start(
        &mut self,
        installer: &Path,
        cancel: &CancellationToken,
    ) -> Result<OsInstallReport, OsInstallError> {
        self.session = Session::default();

        // Armed before anything is launched so an early signal is not lost.
        let mut handshakes = self.services.handshake.arm().map_err(|err| {
            OsInstallError::new(
                OsInstallErrorKind::LaunchFailure,
                format!("Could not listen for the installer handshake: {err}"),
            )
        })?;

        self.session.app_path = self.resolve_app(installer)?;
        self.session.os_version = read_installer_os_version(&self.session.app_path);
        debug!(
            app = %self.session.app_path.display(),
            os_version = %self.session.os_version,
            "installer resolved"
        );

        let mut job = self.launch()?;
        let exit = self.stream(job.as_mut(), &mut handshakes, cancel).await;

        match exit {
            // A handshake can race the final reads.
            LoopExit::Exited(_) => self.drain_handshakes(&mut handshakes),
            // The installer was stopped; it must not be released to reboot.
            LoopExit::Cancelled | LoopExit::Stalled => discard_handshakes(&mut handshakes),
        }
        self.services.status.percent(100);

        match exit {
            LoopExit::Cancelled => {
                info!("macOS install cancelled");
                Err(self.fail(OsInstallErrorKind::Cancelled, "startosinstall was stopped"))
            }
            LoopExit::Stalled => Err(self.fail(
                OsInstallErrorKind::StallTimeout,
                format!(
                    "startosinstall timeout after {} seconds",
                    self.config.osinstall.stall_timeout.as_secs()
                ),
            )),
            LoopExit::Exited(code) if code != 0 => {
                let stderr = job.take_stderr();
                self.session.transcript.extend(stderr);
                self.services.status.minor(&format!(
                    "Starting macOS install failed with return code {code}"
                ));
                Err(self.fail(
                    OsInstallErrorKind::NonZeroExit(code),
                    format!("startosinstall failed with return code {code}"),
                ))
            }
            LoopExit::Exited(_) if !self.session.signal_received => Err(self.fail(
                OsInstallErrorKind::HandshakeMissing,
                "startosinstall did not complete successfully. \
                 See /var/log/install.log for details.",
            )),
            LoopExit::Exited(_) => {
                info!(os_version = %self.session.os_version, "macOS install successfully set up");
                let session = std::mem::take(&mut self.session);
                Ok(OsInstallReport {
                    app_path: session.app_path,
                    os_version: session.os_version,
                    mount_point: session.mount_point,
                    transcript: session.transcript,
                })
            }
        }
    }

    fn resolve_app(&mut self, installer: &Path) -> Result<PathBuf, OsInstallError> {
        if installer.extension().is_some_and(|ext| ext == "app") {
            return Ok(installer.to_owned());
        }
        if !has_disk_image_extension(installer) {
            return Err(OsInstallError::new(
                OsInstallErrorKind::InstallerNotFound,
                format!(
                    "{} doesn't appear to be an application or disk image",
                    installer.display()
                ),
            ));
        }

        info!(image = %installer.display(), "Mounting disk image");
        let mount_points = self
            .services
            .disk_images
            .mount(installer)
            .map_err(|err| {
                OsInstallError::new(
                    OsInstallErrorKind::MountFailure,
                    format!("Could not mount {}: {err}", installer.display()),
                )
            })?;
        let Some(mount_point) = mount_points.into_iter().next() else {
            return Err(OsInstallError::new(
                OsInstallErrorKind::MountFailure,
                format!("No filesystems mounted from {}", installer.display()),
            ));
        };

        let app = find_installer_app(&mount_point);
        self.session.mount_point = Some(mount_point);
        match app {
            Some(app) => Ok(app),
            None => Err(self.fail(
                OsInstallErrorKind::InstallerNotFound,
                format!("Valid Install macOS.app not found on {}", installer.display()),
            )),
        }
    }

    fn launch(&mut self) -> Result<Box<dyn InstallerJob>, OsInstallError> {
        let osinstall = &self.config.osinstall;
        let wrapper = Wrapper::resolve(
            &Wrapper::candidates(&self.config),
            &osinstall.script_fallback,
        );
        if let Wrapper::Script(_) = wrapper {
            warn!("ptyexec not found, falling back to script");
        }
        let settings = LaunchSettings {
            reboot_delay: osinstall.reboot_delay,
            pid_to_signal: std::process::id(),
            volume_flag_threshold: osinstall.volume_flag_threshold.clone(),
        };
        let command = build_installer_command(
            &wrapper,
            &self.session.app_path,
            &self.session.os_version,
            &settings,
        );

        match self.services.launcher.start(&command) {
            Ok(job) => {
                info!(pid = ?job.pid(), "startosinstall launched");
                Ok(job)
            }
            Err(err) => {
                self.services.status.error(&format!(
                    "Error launching startosinstall ({:?}): {err}",
                    command.argv
                ));
                self.services.status.error("Aborting startosinstall run.");
                Err(self.fail(OsInstallErrorKind::LaunchFailure, err.to_string()))
            }
        }
    }

    /// Inactivity-timeout loop. Returns once the installer has exited, gone
    /// silent for too long, or the run was cancelled.
    async fn stream(
        &mut self,
        job: &mut dyn InstallerJob,
        handshakes: &mut UnboundedReceiver<()>,
        cancel: &CancellationToken,
    ) -> LoopExit {
        let poll = self.config.osinstall.poll_interval;
        let ceiling = self.config.osinstall.stall_timeout;
        let mut inactive = Duration::ZERO;

        loop {
            if cancel.is_cancelled() {
                job.stop();
                return LoopExit::Cancelled;
            }

            self.drain_handshakes(handshakes);

            if let Some(line) = job.poll_stdout_line() {
                inactive = Duration::ZERO;
                trace!(%line, "startosinstall");
                Progress::classify(&line).report(self.services.status.as_ref());
                self.session.transcript.push(line);
                continue;
            }

            if let Some(code) = job.exit_code() {
                debug!(code, "startosinstall exited");
                return LoopExit::Exited(code);
            }

            inactive += poll;
            if inactive >= ceiling {
                self.services.status.error(&format!(
                    "startosinstall timeout after {} seconds",
                    ceiling.as_secs()
                ));
                job.stop();
                return LoopExit::Stalled;
            }
            self.services.clock.sleep(poll).await;
        }
    }

    fn drain_handshakes(&mut self, handshakes: &mut UnboundedReceiver<()>) {
        while handshakes.try_recv().is_ok() {
            self.on_handshake();
        }
    }

    fn on_handshake(&mut self) {
        debug!("Got SIGUSR1 from startosinstall");
        self.session.signal_received = true;

        if let Some(tasks) = self.finishing_tasks.take() {
            tasks();
        }

        let marker = &self.config.paths.startup_marker;
        if let Err(err) = std::fs::File::create(marker) {
            self.services.status.error(&format!(
                "Could not set up Munki to run after OS upgrade is complete: {err}"
            ));
        }

        if let Err(err) = self.services.responder.release() {
            error!(%err, "could not release startosinstall");
        }
    }

    /// Build a failure, unmounting the image this attempt mounted.
    fn fail(&mut self, kind: OsInstallErrorKind, message: impl Into<String>) -> OsInstallError {
        if let Some(mount_point) = self.session.mount_point.take() {
            if let Err(err) = self.services.disk_images.unmount(&mount_point) {
                warn!(%err, mount_point = %mount_point.display(), "unmount failed");
            }
        }
        let transcript = std::mem::take(&mut self.session.transcript);
        OsInstallError::new(kind, message).with_transcript(transcript)
    }
}

fn discard_handshakes(handshakes: &mut UnboundedReceiver<()>) {
    handshakes.close();
    while handshakes.try_recv().is_ok() {
        debug!("ignoring handshake from a stopped installer");
    }
}

impl std::fmt::Debug for OsInstallRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsInstallRunner")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
