#![forbid(unsafe_code)]

use clap::Parser;
use config::Config;
use osupgrade::cli::{Cli, Command};
use osupgrade::commands;
use osupgrade::signals::ShutdownListener;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// How often the stop-request flag file is checked.
const STOP_FLAG_POLL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // NOTE: The verbosity flag takes precedence over the environment variable
    // for log control. `OSUPGRADE_LOG` can only set the level per crate, eg.
    // `OSUPGRADE_LOG=orchestrator=trace osupgrade install-os`.
    let env_filter = EnvFilter::builder()
        .with_env_var("OSUPGRADE_LOG")
        .from_env()?
        .add_directive(cli.verbosity.log_level_filter().as_str().parse()?);

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter)
        .init();

    // load config
    let config = match &cli.conffile {
        Some(path) => Config::load(path)?,
        _ => {
            let mut candidates = glob::glob("/etc/osupgrade/config.d/*.toml")?
                .filter_map(Result::ok)
                .collect::<Vec<_>>();
            candidates.insert(0, "/etc/osupgrade/config.toml".into());
            trace!(?candidates, "config file candidates");
            Config::load_multiple(candidates)?
        }
    };
    debug!(?config, ?cli);

    match cli.command {
        Command::CheckBlocking { pkginfo } => {
            let report = commands::check_blocking(&config, &pkginfo)?;
            Ok(exit_code(!report.any_blocking()))
        }
        Command::ForceLogout => {
            let report = commands::force_logout(&config)?;
            info!(signalled = ?report.signalled, "users logged out");
            Ok(ExitCode::SUCCESS)
        }
        Command::CatalogInfo { mount_point } => {
            commands::catalog_info(&mount_point, std::io::stdout().lock())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::InstallOs { force_logout } => {
            let cancel = CancellationToken::new();
            let listener = ShutdownListener::new(&config.paths.stop_request_flag, STOP_FLAG_POLL)?;
            let watcher = tokio::spawn(listener.cancel_on_shutdown(cancel.clone()));

            let result = commands::install_os(&config, force_logout, &cancel).await;
            cancel.cancel();
            watcher.await?;

            match result {
                Ok(success) => Ok(exit_code(success)),
                Err(err) => {
                    error!("{err:#}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
