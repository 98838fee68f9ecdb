#![forbid(unsafe_code)]

//! Turning operator stop requests into cancellation of the running upgrade.

use std::path::PathBuf;
use std::time::Duration;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownEvent {
    /// SIGINT
    Interrupt,
    /// SIGTERM
    Terminate,
    /// The status display dropped its stop-request flag file.
    StopRequested,
}

pub struct ShutdownListener {
    sigint: Signal,
    sigterm: Signal,
    stop_flag: PathBuf,
    poll: Duration,
}

impl ShutdownListener {
    /// Install the signal handlers. Must be called from within a runtime.
    pub fn new(stop_flag: impl Into<PathBuf>, poll: Duration) -> std::io::Result<Self> {
        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
            stop_flag: stop_flag.into(),
            poll,
        })
    }

    pub async fn recv(&mut self) -> ShutdownEvent {
        let mut ticker = tokio::time::interval(self.poll);
        loop {
            tokio::select! {
                Some(()) = self.sigint.recv() => return ShutdownEvent::Interrupt,
                Some(()) = self.sigterm.recv() => return ShutdownEvent::Terminate,
                _ = ticker.tick() => {
                    if self.stop_flag.exists() {
                        return ShutdownEvent::StopRequested;
                    }
                    trace!("no stop request");
                }
            }
        }
    }

    /// Cancel `cancel` on the first shutdown event. Returns early if the
    /// token is cancelled elsewhere.
    pub async fn cancel_on_shutdown(mut self, cancel: CancellationToken) {
        tokio::select! {
            event = self.recv() => {
                info!(?event, "stop requested, cancelling");
                cancel.cancel();
            }
            _ = cancel.cancelled() => {}
        }
    }
}

impl std::fmt::Debug for ShutdownListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownListener")
            .field("stop_flag", &self.stop_flag)
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}
