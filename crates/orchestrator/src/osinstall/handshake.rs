#![forbid(unsafe_code)]

//! Ready-to-reboot rendezvous with the installer.
//!
//! The installer pauses right before rebooting and sends the handshake signal
//! to the pid passed on its command line. The supervisor finishes its own
//! bookkeeping and then sends the same signal back, which releases the
//! installer to reboot.
//!
//! Signal delivery only enqueues a notification. All work in response to it
//! happens on the supervisor's control loop.

use crate::error::Error;
use crate::processes::{ProcessInventory, ProcessSignaller, signal_by_name};
use nix::sys::signal::Signal;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

pub trait HandshakeListener: Send + Sync {
    /// Start listening. Must be called before the installer is launched.
    fn arm(&self) -> Result<UnboundedReceiver<()>, Error>;
}

/// Listens for `SIGUSR1` delivered to this process.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixSignalListener;

impl HandshakeListener for UnixSignalListener {
    fn arm(&self) -> Result<UnboundedReceiver<()>, Error> {
        // The disposition is replaced here, synchronously, so a signal that
        // arrives before the forwarding task first runs is still queued.
        let mut stream = signal(SignalKind::user_defined1())?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                debug!("handshake signal received");
                if tx.send(()).is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

pub trait HandshakeResponder: Send + Sync {
    /// Let the waiting installer proceed with its reboot.
    fn release(&self) -> Result<(), Error>;
}

/// Replies by signalling every process with the installer's name.
///
/// The installer runs under a wrapper, so its pid is not the one we spawned.
/// Addressing it by name is only sound while exactly one installer process
/// exists on the machine, which holds for an OS upgrade.
pub struct SignalBroadcast {
    inventory: ProcessInventory,
    signaller: Box<dyn ProcessSignaller>,
    process_name: String,
}

impl SignalBroadcast {
    pub fn new(
        inventory: ProcessInventory,
        signaller: Box<dyn ProcessSignaller>,
        process_name: impl Into<String>,
    ) -> Self {
        Self {
            inventory,
            signaller,
            process_name: process_name.into(),
        }
    }
}

impl HandshakeResponder for SignalBroadcast {
    fn release(&self) -> Result<(), Error> {
        let snapshot = self.inventory.try_snapshot()?;
        let pids = signal_by_name(
            &snapshot,
            self.signaller.as_ref(),
            &self.process_name,
            Signal::SIGUSR1,
        )?;
        match pids.len() {
            0 => warn!(name = %self.process_name, "no installer process to release"),
            1 => info!(pid = pids[0], "installer released to reboot"),
            _ => warn!(?pids, "released more than one installer process"),
        }
        Ok(())
    }
}

impl std::fmt::Debug for SignalBroadcast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalBroadcast")
            .field("process_name", &self.process_name)
            .finish_non_exhaustive()
    }
}
