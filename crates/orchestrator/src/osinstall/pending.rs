#![forbid(unsafe_code)]

use crate::documents::{InstallInfo, read_install_info};
use crate::install_log::{INSTALL_LOG, LogSink, MAIN_LOG};
use crate::osinstall::runner::{FinishingTasks, OsInstallRunner, OsInstallServices};
use crate::status::{INDETERMINATE, StatusDisplay};
use config::Config;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const RULE_WIDTH: usize = 78;

/// Read `InstallInfo.plist`, reporting an unreadable file to the status
/// display.
pub fn load_install_info(config: &Config, status: &dyn StatusDisplay) -> Option<InstallInfo> {
    let info_path = config.paths.install_info();
    match read_install_info(&info_path) {
        Ok(info) => Some(info),
        Err(err) => {
            debug!(%err, "install info unreadable");
            status.error(&format!("Invalid {}", info_path.display()));
            None
        }
    }
}

/// Run the first pending OS upgrade listed in `install_info`.
///
/// Returns `true` only when the installer was set up and released to reboot.
/// A missing upgrade, an earlier stop request and every failure return
/// `false`; failures are reported to the status display and the install log.
pub async fn run_pending_os_install(
    config: &Config,
    install_info: &InstallInfo,
    services: OsInstallServices,
    log: &dyn LogSink,
    cancel: &CancellationToken,
    finishing_tasks: Option<FinishingTasks>,
) -> bool {
    let status = Arc::clone(&services.status);

    if config.display.suppress_stop_button {
        status.set_stop_button_visible(false);
    }

    log.append(MAIN_LOG, "### Beginning os installer session ###");
    let mut success = false;
    if cancel.is_cancelled() {
        info!("stop requested, skipping macOS install");
    } else if let Some(item) = install_info.pending_os_install() {
        let version = item.version_to_install.as_deref().unwrap_or_default();
        status.major(&format!("Starting macOS {version} install..."));
        status.percent(INDETERMINATE);

        // `pending_os_install` only yields items with an installer item.
        let item_name = item.installer_item.as_deref().unwrap_or_default();
        let installer = config.paths.cache_dir().join(item_name);

        let mut runner = OsInstallRunner::new(config.clone(), services);
        if let Some(tasks) = finishing_tasks {
            runner = runner.with_finishing_tasks(tasks);
        }
        match runner.start(&installer, cancel).await {
            Ok(report) => {
                log.append(MAIN_LOG, "macOS install successfully set up.");
                log.append(
                    INSTALL_LOG,
                    &format!("Starting macOS install of {}: SUCCESSFUL", report.os_version),
                );
                success = true;
            }
            Err(err) => {
                if !err.transcript.is_empty() {
                    let rule = "-".repeat(RULE_WIDTH);
                    status.error(&rule);
                    for line in &err.transcript {
                        status.error(line.trim_end_matches('\n'));
                    }
                    status.error(&rule);
                }
                status.error(&format!("Error starting macOS install: {err}"));
                log.append(INSTALL_LOG, &format!("Starting macOS install: FAILED: {err}"));
            }
        }
    } else {
        debug!("no pending macOS install");
    }
    log.append(MAIN_LOG, "### Ending os installer session ###");
    success
}
