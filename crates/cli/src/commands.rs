#![forbid(unsafe_code)]

use anyhow::{Context, bail};
use config::Config;
use orchestrator::documents::read_package_descriptor;
use orchestrator::osinstall::{
    ChildLauncher, OsInstallServices, SignalBroadcast, UnixSignalListener, load_install_info,
    run_pending_os_install,
};
use orchestrator::{
    BlockingReport, FileLogSink, FinishingTasks, ForceLogout, Hdiutil, LogSink, LogoutReport,
    MAIN_LOG, NixSignaller, ProcessInventory, StatusDisplay, SystemClock, TracingStatus,
    evaluate_blocking,
};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Which applications named by a package description are running.
pub fn check_blocking(config: &Config, pkginfo: &Path) -> anyhow::Result<BlockingReport> {
    let descriptor = read_package_descriptor(pkginfo)?;
    let snapshot = ProcessInventory::system(config).snapshot();
    let report = evaluate_blocking(&descriptor, &snapshot);
    if report.any_blocking() {
        warn!(running = ?report.running, "blocking applications are running");
    } else {
        info!(checked = ?report.candidates, "no blocking applications running");
    }
    Ok(report)
}

pub fn force_logout(config: &Config) -> anyhow::Result<LogoutReport> {
    let inventory = ProcessInventory::system(config);
    let report = ForceLogout::new(config, &inventory, &NixSignaller)
        .run()
        .context("forced logout failed")?;
    Ok(report)
}

/// Write the package description of the installer mounted at `mount_point`.
pub fn catalog_info(mount_point: &Path, out: impl std::io::Write) -> anyhow::Result<()> {
    let Some(info) = orchestrator::osinstall::catalog_info(mount_point) else {
        bail!("no macOS installer found on {}", mount_point.display());
    };
    plist::to_writer_xml(out, &info).context("could not write catalog info")?;
    Ok(())
}

/// Run the pending macOS upgrade.
///
/// Returns `Ok(true)` when there is nothing to install or the installer was
/// released to reboot, `Ok(false)` when the attempt failed or
/// `InstallInfo.plist` could not be read.
pub async fn install_os(
    config: &Config,
    force: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<bool> {
    let status: Arc<dyn StatusDisplay + Send + Sync> = Arc::new(TracingStatus);
    let Some(install_info) = load_install_info(config, status.as_ref()) else {
        return Ok(false);
    };
    let Some(item) = install_info.pending_os_install() else {
        info!("no pending macOS install");
        return Ok(true);
    };

    let snapshot = ProcessInventory::system(config).snapshot();
    let blocking = evaluate_blocking(&item.descriptor(), &snapshot);
    if blocking.any_blocking() {
        if !force {
            bail!(
                "blocking applications are running: {}",
                blocking.running.join(", ")
            );
        }
        warn!(running = ?blocking.running, "forcing logout before macOS install");
        force_logout(config)?;
    }

    let log = FileLogSink::new(&config.paths.log_dir);
    let finishing_log = log.clone();
    let finishing_tasks: FinishingTasks = Box::new(move || {
        finishing_log.append(MAIN_LOG, "macOS installer is ready to restart.");
    });

    let services = OsInstallServices {
        disk_images: Box::new(Hdiutil::default()),
        launcher: Box::new(ChildLauncher),
        handshake: Box::new(UnixSignalListener),
        responder: Box::new(SignalBroadcast::new(
            ProcessInventory::system(config),
            Box::new(NixSignaller),
            config.osinstall.installer_process_name.clone(),
        )),
        status,
        clock: Box::new(SystemClock),
    };

    let success = run_pending_os_install(
        config,
        &install_info,
        services,
        &log,
        cancel,
        Some(finishing_tasks),
    )
    .await;
    Ok(success)
}
