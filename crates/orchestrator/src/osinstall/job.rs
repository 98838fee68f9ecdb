#![forbid(unsafe_code)]

use crate::osinstall::command::InstallerCommand;
use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use std::io::{BufRead, BufReader, Read};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace, warn};

/// How long output may keep trickling in after the child has exited.
const EXIT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// A running installer process as seen by the supervisor.
///
/// None of these calls block.
pub trait InstallerJob: Send {
    fn pid(&self) -> Option<u32>;
    /// Next complete stdout line without its terminator, if one is ready.
    fn poll_stdout_line(&mut self) -> Option<String>;
    /// Exit code once the process has exited and its output is drained.
    fn exit_code(&mut self) -> Option<i32>;
    /// Ask the process to stop. Does not wait for it.
    fn stop(&mut self);
    /// Everything the process wrote to stderr so far.
    fn take_stderr(&mut self) -> Vec<String>;
}

pub trait JobLauncher: Send + Sync {
    fn start(&self, command: &InstallerCommand) -> std::io::Result<Box<dyn InstallerJob>>;
}

/// Launches the installer as a child process in its own process group.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChildLauncher;

impl JobLauncher for ChildLauncher {
    fn start(&self, command: &InstallerCommand) -> std::io::Result<Box<dyn InstallerJob>> {
        let Some(program) = command.program() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty installer command",
            ));
        };
        let mut child = Command::new(program)
            .args(command.args())
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .spawn()?;
        debug!(pid = child.id(), program, "installer started");

        let (tx, rx) = mpsc::unbounded_channel();
        let stdout_done = Arc::new(AtomicBool::new(false));
        let stderr_lines = Arc::new(Mutex::new(Vec::new()));

        let mut stderr_reader_handle = None;
        let spawned = (|| -> std::io::Result<()> {
            if let Some(stdout) = child.stdout.take() {
                let done = Arc::clone(&stdout_done);
                std::thread::Builder::new()
                    .name("installer-stdout".into())
                    .spawn(move || stdout_reader(stdout, tx, done))?;
            } else {
                stdout_done.store(true, Ordering::Release);
            }
            if let Some(stderr) = child.stderr.take() {
                let lines = Arc::clone(&stderr_lines);
                stderr_reader_handle = Some(
                    std::thread::Builder::new()
                        .name("installer-stderr".into())
                        .spawn(move || stderr_reader(stderr, lines))?,
                );
            }
            Ok(())
        })();
        if let Err(err) = spawned {
            let _ = child.kill();
            let _ = child.wait();
            return Err(err);
        }

        Ok(Box::new(ChildJob {
            child,
            lines: rx,
            stdout_done,
            stderr_lines,
            stderr_reader: stderr_reader_handle,
            exited: None,
        }))
    }
}

fn stdout_reader(stdout: impl Read, tx: UnboundedSender<String>, done: Arc<AtomicBool>) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']).to_owned();
                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                trace!(%err, "installer stdout closed");
                break;
            }
        }
    }
    done.store(true, Ordering::Release);
}

fn stderr_reader(stderr: impl Read, lines: Arc<Mutex<Vec<String>>>) {
    for line in BufReader::new(stderr).lines() {
        let Ok(line) = line else {
            break;
        };
        match lines.lock() {
            Ok(mut guard) => guard.push(line),
            Err(poisoned) => poisoned.into_inner().push(line),
        }
    }
}

fn exit_code_of(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

pub struct ChildJob {
    child: Child,
    lines: UnboundedReceiver<String>,
    stdout_done: Arc<AtomicBool>,
    stderr_lines: Arc<Mutex<Vec<String>>>,
    stderr_reader: Option<JoinHandle<()>>,
    exited: Option<(i32, Instant)>,
}

impl InstallerJob for ChildJob {
    fn pid(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn poll_stdout_line(&mut self) -> Option<String> {
        self.lines.try_recv().ok()
    }

    fn exit_code(&mut self) -> Option<i32> {
        if self.exited.is_none() {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    let code = exit_code_of(status);
                    debug!(code, "installer exited");
                    self.exited = Some((code, Instant::now()));
                }
                Ok(None) => return None,
                Err(err) => {
                    warn!(%err, "failed to poll installer status");
                    return None;
                }
            }
        }
        let (code, at) = self.exited?;
        // A grandchild can hold the pipe open after the wrapper exits.
        let drained = self.stdout_done.load(Ordering::Acquire) && self.lines.is_empty();
        if drained || at.elapsed() >= EXIT_DRAIN_GRACE {
            Some(code)
        } else {
            None
        }
    }

    fn stop(&mut self) {
        let pid = self.child.id();
        debug!(pid, "stopping installer");
        let Ok(raw) = i32::try_from(pid) else {
            return;
        };
        match killpg(Pid::from_raw(raw), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(err) => {
                warn!(pid, %err, "failed to signal installer process group");
                let _ = self.child.kill();
            }
        }
    }

    fn take_stderr(&mut self) -> Vec<String> {
        if let Some((_, at)) = self.exited {
            // Give the reader a moment to collect what was written just
            // before exit; a grandchild may keep the pipe open indefinitely.
            while self
                .stderr_reader
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
                && at.elapsed() < EXIT_DRAIN_GRACE
            {
                std::thread::sleep(Duration::from_millis(10));
            }
        }
        match self.stderr_lines.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl std::fmt::Debug for ChildJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildJob")
            .field("pid", &self.child.id())
            .field("exited", &self.exited)
            .finish_non_exhaustive()
    }
}
