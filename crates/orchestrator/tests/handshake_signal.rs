#![forbid(unsafe_code)]
#![cfg(unix)]

use nix::sys::signal::{Signal, raise};
use orchestrator::osinstall::{HandshakeListener, UnixSignalListener};
use std::time::Duration;

#[tokio::test]
async fn handshake_signal_is_delivered_as_a_message() {
    let mut handshakes = UnixSignalListener.arm().unwrap();

    raise(Signal::SIGUSR1).unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), handshakes.recv()).await;
    assert!(matches!(received, Ok(Some(()))), "no handshake within timeout");
    assert!(handshakes.try_recv().is_err());
}
